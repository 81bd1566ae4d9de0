//! Carousels: ordered slides attached to a CMS code.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carousel {
    pub code: String,
    pub name: String,
    pub items: Vec<CarouselItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselItem {
    pub name: String,
    pub link: Option<String>,
    pub image: Option<String>,
    /// Wiki markup, rendered by the presentation layer.
    pub description: Option<String>,
}

impl Carousel {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
