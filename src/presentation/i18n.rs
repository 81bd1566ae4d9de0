//! Built-in translations for the languages the front-end ships with.
//!
//! Anything not listed here falls back to English.

/// Strings and calendar names for one language.
pub struct Catalogue {
    pub code: &'static str,
    pub months: [&'static str; 12],
    pub months_abbr: [&'static str; 12],
    /// Monday first.
    pub weekdays: [&'static str; 7],
    pub weekdays_abbr: [&'static str; 7],
    pub am_pm: [&'static str; 2],
    pub date_patterns: DatePatterns,
    pub states: [(&'static str, &'static str); 12],
    pub ui: UiStrings,
}

/// CLDR `short | medium | long | full` patterns.
pub struct DatePatterns {
    pub date: [&'static str; 4],
    pub time: [&'static str; 4],
    /// `{date}` and `{time}` placeholders.
    pub datetime: &'static str,
}

pub struct UiStrings {
    pub home: &'static str,
    pub languages: &'static str,
    pub not_found_title: &'static str,
    pub not_found_message: &'static str,
    pub server_error_title: &'static str,
    pub server_error_message: &'static str,
    pub back_home: &'static str,
}

static EN: Catalogue = Catalogue {
    code: "en",
    months: [
        "January", "February", "March", "April", "May", "June", "July", "August", "September",
        "October", "November", "December",
    ],
    months_abbr: [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ],
    weekdays: [
        "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
    ],
    weekdays_abbr: ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
    am_pm: ["AM", "PM"],
    date_patterns: DatePatterns {
        date: ["M/d/yy", "MMM d, y", "MMMM d, y", "EEEE, MMMM d, y"],
        time: ["h:mm a", "h:mm:ss a", "h:mm:ss a", "h:mm:ss a"],
        datetime: "{date}, {time}",
    },
    states: [
        ("draft", "Draft"),
        ("quotation", "Quotation"),
        ("confirmed", "Confirmed"),
        ("processing", "Processing"),
        ("done", "Done"),
        ("cancel", "Canceled"),
        ("validated", "Validated"),
        ("posted", "Posted"),
        ("paid", "Paid"),
        ("received", "Received"),
        ("assigned", "Assigned"),
        ("pending", "Pending"),
    ],
    ui: UiStrings {
        home: "Home",
        languages: "Languages",
        not_found_title: "Page Not Found",
        not_found_message: "The page you requested does not exist.",
        server_error_title: "Something Went Wrong",
        server_error_message: "The server could not complete your request. Please try again later.",
        back_home: "Back to home",
    },
};

static ES: Catalogue = Catalogue {
    code: "es",
    months: [
        "enero", "febrero", "marzo", "abril", "mayo", "junio", "julio", "agosto", "septiembre",
        "octubre", "noviembre", "diciembre",
    ],
    months_abbr: [
        "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
    ],
    weekdays: [
        "lunes", "martes", "miércoles", "jueves", "viernes", "sábado", "domingo",
    ],
    weekdays_abbr: ["lun", "mar", "mié", "jue", "vie", "sáb", "dom"],
    am_pm: ["a. m.", "p. m."],
    date_patterns: DatePatterns {
        date: ["d/M/yy", "d MMM y", "d 'de' MMMM 'de' y", "EEEE, d 'de' MMMM 'de' y"],
        time: ["H:mm", "H:mm:ss", "H:mm:ss", "H:mm:ss"],
        datetime: "{date}, {time}",
    },
    states: [
        ("draft", "Borrador"),
        ("quotation", "Presupuesto"),
        ("confirmed", "Confirmado"),
        ("processing", "En proceso"),
        ("done", "Realizado"),
        ("cancel", "Cancelado"),
        ("validated", "Validado"),
        ("posted", "Contabilizado"),
        ("paid", "Pagado"),
        ("received", "Recibido"),
        ("assigned", "Asignado"),
        ("pending", "Pendiente"),
    ],
    ui: UiStrings {
        home: "Inicio",
        languages: "Idiomas",
        not_found_title: "Página no encontrada",
        not_found_message: "La página que busca no existe.",
        server_error_title: "Algo ha fallado",
        server_error_message: "El servidor no ha podido completar su petición. Inténtelo de nuevo más tarde.",
        back_home: "Volver al inicio",
    },
};

static CA: Catalogue = Catalogue {
    code: "ca",
    months: [
        "gener", "febrer", "març", "abril", "maig", "juny", "juliol", "agost", "setembre",
        "octubre", "novembre", "desembre",
    ],
    months_abbr: [
        "gen.", "febr.", "març", "abr.", "maig", "juny", "jul.", "ag.", "set.", "oct.", "nov.",
        "des.",
    ],
    weekdays: [
        "dilluns", "dimarts", "dimecres", "dijous", "divendres", "dissabte", "diumenge",
    ],
    weekdays_abbr: ["dl.", "dt.", "dc.", "dj.", "dv.", "ds.", "dg."],
    am_pm: ["a. m.", "p. m."],
    date_patterns: DatePatterns {
        date: ["d/M/yy", "d MMM y", "d MMMM 'de' y", "EEEE, d MMMM 'de' y"],
        time: ["H:mm", "H:mm:ss", "H:mm:ss", "H:mm:ss"],
        datetime: "{date}, {time}",
    },
    states: [
        ("draft", "Esborrany"),
        ("quotation", "Pressupost"),
        ("confirmed", "Confirmat"),
        ("processing", "En procés"),
        ("done", "Realitzat"),
        ("cancel", "Cancel·lat"),
        ("validated", "Validat"),
        ("posted", "Comptabilitzat"),
        ("paid", "Pagat"),
        ("received", "Rebut"),
        ("assigned", "Assignat"),
        ("pending", "Pendent"),
    ],
    ui: UiStrings {
        home: "Inici",
        languages: "Idiomes",
        not_found_title: "Pàgina no trobada",
        not_found_message: "La pàgina que cerqueu no existeix.",
        server_error_title: "Alguna cosa ha fallat",
        server_error_message: "El servidor no ha pogut completar la petició. Torneu-ho a provar més tard.",
        back_home: "Torna a l'inici",
    },
};

/// Catalogue for a language code, English when unknown.
pub fn catalogue(code: &str) -> &'static Catalogue {
    match code {
        "es" => &ES,
        "ca" => &CA,
        _ => &EN,
    }
}

impl Catalogue {
    pub fn state_label(&self, key: &str) -> Option<&'static str> {
        self.states
            .iter()
            .find(|(state, _)| *state == key)
            .map(|(_, label)| *label)
    }
}
