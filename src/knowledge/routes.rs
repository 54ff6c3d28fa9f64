//! Administration routes and the dosage-form table that implies them.

use serde::{Deserialize, Serialize};

/// Canonical administration route for a medicine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    #[default]
    Oral,
    Nasal,
    Topical,
    Ophthalmic,
    Otic,
    Inhaled,
    Parenteral,
    Rectal,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Oral => "oral",
            Route::Nasal => "nasal",
            Route::Topical => "topical",
            Route::Ophthalmic => "ophthalmic",
            Route::Otic => "otic",
            Route::Inhaled => "inhaled",
            Route::Parenteral => "parenteral",
            Route::Rectal => "rectal",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dosage-form term → implied route.
///
/// Scanned against medicine names and instructions by the post-processor.
/// Longer, more specific terms come first so "nasal spray" wins over "spray".
pub const FORM_ROUTES: &[(&str, Route)] = &[
    ("nasal spray", Route::Nasal),
    ("nasal drops", Route::Nasal),
    ("eye drops", Route::Ophthalmic),
    ("eye ointment", Route::Ophthalmic),
    ("ear drops", Route::Otic),
    ("oral solution", Route::Oral),
    ("oral suspension", Route::Oral),
    ("oral paste", Route::Oral),
    ("tablet", Route::Oral),
    ("capsule", Route::Oral),
    ("syrup", Route::Oral),
    ("lozenge", Route::Oral),
    ("suspension", Route::Oral),
    ("spray", Route::Nasal),
    ("inhaler", Route::Inhaled),
    ("nebulizer", Route::Inhaled),
    ("puff", Route::Inhaled),
    ("cream", Route::Topical),
    ("ointment", Route::Topical),
    ("gel", Route::Topical),
    ("lotion", Route::Topical),
    ("injection", Route::Parenteral),
    ("injectable", Route::Parenteral),
    ("vial", Route::Parenteral),
    ("suppository", Route::Rectal),
];

/// Find the route implied by a dosage-form term inside `text`, if any.
/// First (most specific) matching form wins.
pub fn route_for_form(text: &str) -> Option<(&'static str, Route)> {
    let lower = text.to_lowercase();
    FORM_ROUTES
        .iter()
        .find(|&&(form, _)| lower.contains(form))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tablet_implies_oral() {
        assert_eq!(route_for_form("nitrofurantoin tablet"), Some(("tablet", Route::Oral)));
    }

    #[test]
    fn nasal_spray_beats_generic_spray() {
        let (form, route) = route_for_form("oxymetazoline nasal spray").unwrap();
        assert_eq!(form, "nasal spray");
        assert_eq!(route, Route::Nasal);
    }

    #[test]
    fn eye_drops_ophthalmic_ear_drops_otic() {
        assert_eq!(route_for_form("use the eye drops").unwrap().1, Route::Ophthalmic);
        assert_eq!(route_for_form("two ear drops").unwrap().1, Route::Otic);
    }

    #[test]
    fn no_form_term_no_route() {
        assert_eq!(route_for_form("paracetamol after food"), None);
    }

    #[test]
    fn route_serializes_lowercase() {
        let json = serde_json::to_string(&Route::Ophthalmic).unwrap();
        assert_eq!(json, "\"ophthalmic\"");
    }
}
