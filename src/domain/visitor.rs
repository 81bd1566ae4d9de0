//! Who is browsing, as far as visibility rules are concerned.

/// Session flags consulted by menu visibility and price display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Visitor {
    pub logged_in: bool,
    pub manager: bool,
    pub show_price: bool,
}

impl Visitor {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn customer() -> Self {
        Self {
            logged_in: true,
            manager: false,
            show_price: true,
        }
    }

    pub fn manager() -> Self {
        Self {
            logged_in: true,
            manager: true,
            show_price: true,
        }
    }
}

/// Catalogue-wide price display switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PricePolicy {
    pub guest_price: bool,
    pub login_price: bool,
    pub manager_price: bool,
}

impl PricePolicy {
    /// Decide whether prices are shown to `visitor`.
    ///
    /// Guest pricing wins outright. When login pricing is enabled a visitor who
    /// opted out of prices never sees them, even a manager.
    pub fn shows_price(&self, visitor: &Visitor) -> bool {
        if self.guest_price {
            return true;
        }
        if self.login_price && !visitor.show_price {
            return false;
        }
        if self.login_price && visitor.logged_in {
            return true;
        }
        self.manager_price && visitor.manager
    }
}
