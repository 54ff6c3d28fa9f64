//! Drug gazetteer: canonical generics with aliases, brands, transliterations
//! and the frequency schedules each drug is actually prescribed at.

use serde::{Deserialize, Serialize};

/// One canonical drug and everything that may refer to it in a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugEntry {
    /// Canonical generic name, lowercase.
    pub generic: String,
    /// Alternate spellings and short forms (lowercase).
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Brand names that must be mapped to the generic before fuzzy matching.
    #[serde(default)]
    pub brands: Vec<String>,
    /// Arabic-script and Latin-Tamil renderings of the name.
    #[serde(default)]
    pub transliterations: Vec<String>,
    /// Frequency schedules this drug is legally prescribed at.
    /// Empty means any canonical frequency is acceptable.
    #[serde(default)]
    pub allowed_frequencies: Vec<String>,
}

fn entry(
    generic: &str,
    aliases: &[&str],
    brands: &[&str],
    transliterations: &[&str],
    allowed_frequencies: &[&str],
) -> DrugEntry {
    DrugEntry {
        generic: generic.to_string(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        brands: brands.iter().map(|s| s.to_string()).collect(),
        transliterations: transliterations.iter().map(|s| s.to_string()).collect(),
        allowed_frequencies: allowed_frequencies.iter().map(|s| s.to_string()).collect(),
    }
}

/// The compiled-in gazetteer. An override directory can replace it at load
/// time; the categories mirror a general-practice formulary.
pub fn builtin_drugs() -> Vec<DrugEntry> {
    vec![
        // Antibiotics
        entry(
            "erythromycin",
            &["erithromycin", "erythromicin", "arithromycin"],
            &[],
            &["erito maisin"],
            &["3 times a day", "4 times a day", "twice daily", "every 8 hours", "every 6 hours"],
        ),
        entry(
            "amoxicillin",
            &["amoxycillin", "amoxylin", "amox"],
            &["amoxil"],
            &["الأموكسيسيللين", "amoxysilan"],
            &["3 times a day", "twice daily", "every 8 hours", "every 12 hours"],
        ),
        entry(
            "amoxicillin-clavulanic acid",
            &["co-amoxiclav"],
            &["augmentin"],
            &[],
            &["twice daily", "3 times a day", "every 12 hours"],
        ),
        entry("azithromycin", &["azithro"], &["zithromax"], &[], &["once daily"]),
        entry(
            "ciprofloxacin",
            &["ciprofloxacine", "ciproflo"],
            &["ciplox"],
            &[],
            &["twice daily", "every 12 hours"],
        ),
        entry(
            "nitrofurantoin",
            &[],
            &["stayhappi", "macrobid"],
            &[],
            &["twice daily", "4 times a day", "every 6 hours"],
        ),
        entry("cephalexin", &["cefalexin"], &[], &[], &["3 times a day", "4 times a day", "every 6 hours"]),
        entry("doxycycline", &["doxy"], &[], &[], &["once daily", "twice daily"]),
        entry("metronidazole", &["metrogyl"], &["flagyl"], &[], &["3 times a day", "every 8 hours"]),
        // Analgesics and antipyretics
        entry(
            "paracetamol",
            &["acetaminophen", "para", "paracetamole", "paracetal"],
            &["crocin", "dolo", "calpol", "tylenol"],
            &["الباراسيتامول"],
            &[],
        ),
        entry(
            "ibuprofen",
            &["ibuprufen"],
            &["brufen", "advil"],
            &[],
            &["3 times a day", "twice daily", "every 8 hours", "as needed"],
        ),
        entry("aspirin", &["asprin", "asprine", "aspireen"], &["disprin"], &["الأسبرين"], &[]),
        entry("diclofenac", &["diclo"], &["voltaren"], &[], &["twice daily", "3 times a day", "as needed"]),
        // Antihistamines
        entry(
            "cetirizine",
            &["cetrizine"],
            &["zyrtec"],
            &[],
            &["once daily", "once at night"],
        ),
        entry(
            "levocetirizine",
            &["levoceti", "levocitirizine", "levocitrazine"],
            &["xyzal"],
            &["ليفوسيتيريزين"],
            &["once daily", "once at night"],
        ),
        entry("loratadine", &["lora"], &["claritin"], &[], &["once daily"]),
        entry("chlorpheniramine", &["cpm"], &["piriton"], &[], &["3 times a day", "once at night"]),
        // Gastrointestinal
        entry("omeprazole", &["omeprazol", "omerazole"], &["prilosec"], &[], &["once daily", "twice daily"]),
        entry("pantoprazole", &["panto", "bento brazul"], &["pantocid"], &[], &["once daily"]),
        entry("ranitidine", &["rnitidine"], &["zantac"], &[], &["twice daily", "once at night"]),
        entry("domperidone", &["domeperidone"], &["motilium"], &[], &["3 times a day"]),
        entry("ondansetron", &["onden citron"], &["zofran"], &[], &["twice daily", "3 times a day", "as needed"]),
        entry("sucralfate", &["sucral"], &["tess"], &[], &["3 times a day", "4 times a day"]),
        entry("antacid", &["anti-acid"], &["gelusil", "digene"], &[], &["as needed", "3 times a day"]),
        // Respiratory
        entry("salbutamol", &["albuterol"], &["ventolin", "asthalin"], &[], &["as needed", "every 6 hours"]),
        entry("montelukast", &[], &["singulair"], &[], &["once at night", "once daily"]),
        entry("bromhexine", &["brohmexine"], &[], &[], &["3 times a day"]),
        entry("dextromethorphan", &["cough syrup"], &[], &[], &["3 times a day", "as needed"]),
        entry("oxymetazoline", &[], &["otrivin"], &[], &["twice daily", "as needed"]),
        // Cardiovascular and metabolic
        entry("amlodipine", &["amlod"], &["norvasc"], &[], &["once daily"]),
        entry("metoprolol", &[], &["lopressor"], &[], &["once daily", "twice daily"]),
        entry("atorvastatin", &[], &["lipitor"], &[], &["once daily", "once at night"]),
        entry("lisinopril", &[], &["zestril"], &[], &["once daily"]),
        entry("losartan", &[], &["cozaar"], &[], &["once daily"]),
        entry(
            "metformin",
            &["metphormion", "metaphormion"],
            &["glucophage"],
            &[],
            &["twice daily", "once daily", "3 times a day"],
        ),
        // Antifungal
        entry("fluconazole", &["flucon"], &["diflucan"], &[], &["once daily"]),
        entry("clotrimazole", &[], &["canesten"], &[], &["twice daily", "3 times a day"]),
        // Steroids
        entry("prednisone", &["prednisolone"], &[], &[], &["once daily", "twice daily"]),
        entry("dexamethasone", &["dexa"], &[], &[], &["once daily", "twice daily"]),
        // Supplements
        entry("vitamin c", &["ascorbic acid"], &["limcee"], &[], &["once daily", "twice daily"]),
        entry("vitamin d", &["cholecalciferol"], &[], &[], &["once daily"]),
    ]
}

/// Keywords whose presence marks a transcript as medical content.
/// Used by the transcription quality gate and the routing keyword density.
pub const MEDICAL_KEYWORDS: &[&str] = &[
    "mg", "ml", "mcg", "tablet", "capsule", "dose", "medicine", "drug",
    "prescribe", "prescription", "infection", "fever", "pain", "cough",
    "cold", "throat", "antibiotic", "diagnosis", "symptom", "treatment",
    "daily", "twice", "morning", "night", "days", "weeks", "doctor",
    "patient", "allergy", "asthma", "bacterial", "syrup", "test", "x-ray",
    // Tamil-in-Latin-script medical vocabulary
    "marunthu", "vali", "kaichal", "kaichel", "noi", "sapadu", "mookkadaippu",
    // Arabic medical vocabulary
    "دواء", "ألم", "حمى", "التهاب", "مرض",
];

/// True if `text` contains at least one medical keyword.
pub fn has_medical_keyword(text: &str) -> bool {
    medical_keyword_hits(text) > 0
}

/// Count distinct medical keywords present in `text`.
pub fn medical_keyword_hits(text: &str) -> usize {
    let lower = text.to_lowercase();
    MEDICAL_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count()
}
