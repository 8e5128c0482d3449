//! Spoken prompts and reply classification
//!
//! Every prompt is Italian. Wording that mentions caregivers follows the
//! size of the caregiver list.

use super::session::Feeling;
use crate::patient::CaregiverCount;

/// Reply prefix meaning "well"
const GOOD_MARKER: &str = "ben";

/// Reply prefix meaning "unwell"
const BAD_MARKER: &str = "mal";

/// Classify a feeling reply by its prefix
#[must_use]
pub fn classify_feeling(reply: &str) -> Feeling {
    let reply = reply.trim().to_lowercase();
    if reply.starts_with(GOOD_MARKER) {
        Feeling::Good
    } else if reply.starts_with(BAD_MARKER) {
        Feeling::Bad
    } else {
        Feeling::Unknown
    }
}

/// Classify a yes/no reply by its prefix; `None` if it is neither
#[must_use]
pub fn classify_yes_no(reply: &str) -> Option<bool> {
    let reply = reply.trim().to_lowercase();
    if reply.starts_with("sì") || reply.starts_with("si") {
        Some(true)
    } else if reply.starts_with("no") {
        Some(false)
    } else {
        None
    }
}

/// "ai tuoi caregiver" / "al tuo caregiver"
const fn to_caregivers(count: CaregiverCount) -> &'static str {
    match count {
        CaregiverCount::Many => "ai tuoi caregiver",
        CaregiverCount::One | CaregiverCount::None => "al tuo caregiver",
    }
}

#[must_use]
pub fn greeting(name: &str) -> String {
    format!("Ciao {name}, come ti senti?")
}

#[must_use]
pub fn feeling_good(name: &str) -> String {
    format!("Bene {name}, sono contento di sentire che ti senti bene!")
}

/// Sympathy, plus an offer to contact caregivers when there are any
#[must_use]
pub fn feeling_bad(name: &str, count: CaregiverCount) -> String {
    let sympathy = format!("Mi dispiace {name}, spero tu ti senta meglio presto.");
    match count {
        CaregiverCount::None => sympathy,
        _ => format!(
            "{sympathy} Vuoi inviare un messaggio di aiuto {}?",
            to_caregivers(count)
        ),
    }
}

#[must_use]
pub fn clarify_feeling() -> String {
    "Scusa non ho capito, potresti rispondermi con bene o male?".to_string()
}

#[must_use]
pub fn clarify_yes_no() -> String {
    "Scusa non ho capito, potresti rispondermi con sì o no?".to_string()
}

/// List the slot's medications
#[must_use]
pub fn announce(name: &str, medications: &[&str]) -> String {
    format!(
        "{name} è il momento di prendere i seguenti farmaci: {}.",
        medications.join(", ")
    )
}

#[must_use]
pub fn verification_rules() -> String {
    "Per ogni farmaco mi mostrerai la scatola e io ti dirò se è quella corretta; \
     nel caso in cui lo sia ti dirò quanto prenderne."
        .to_string()
}

#[must_use]
pub fn instruct(medication: &str, photo_cue: &str) -> String {
    format!("Prendi {medication}; quando sei pronto a farmi riconoscere la scatola dimmi {photo_cue}.")
}

#[must_use]
pub fn box_correct(name: &str, quantity: &str, next_cue: &str) -> String {
    format!(
        "Bene {name} è la scatola corretta, devi prenderne {quantity}. \
         Quando sei pronto a procedere con il prossimo farmaco pronuncia {next_cue}."
    )
}

#[must_use]
pub fn box_wrong() -> String {
    "Scusa non è la scatola corretta, potresti riprovare?".to_string()
}

#[must_use]
pub fn capture_failed(photo_cue: &str) -> String {
    format!("Scusa, non sono riuscito a scattare la foto. Quando sei pronto dimmi di nuovo {photo_cue}.")
}

#[must_use]
pub fn goodbye(name: &str, count: CaregiverCount, help_keyword: &str) -> String {
    let done = format!("Bene {name} hai preso tutti i farmaci necessari.");
    let later = "Noi ci risentiamo quando dovrai prendere i prossimi farmaci.";
    match count {
        CaregiverCount::None => format!("{done} {later}"),
        _ => {
            let to = to_caregivers(count);
            format!(
                "{done} Ora invierò un messaggio di riepilogo {to}. {later} \
                 Intanto, nel caso tu abbia bisogno di aiuto, ricorda di pronunciare \
                 {help_keyword} così invierò un messaggio di aiuto {to}."
            )
        }
    }
}

/// Said before help messages go out
#[must_use]
pub fn help_notice(name: &str, count: CaregiverCount) -> Option<String> {
    match count {
        CaregiverCount::None => None,
        _ => Some(format!("{name} invio un messaggio {}.", to_caregivers(count))),
    }
}

/// Said after help messages went out
#[must_use]
pub fn help_confirmation(name: &str, count: CaregiverCount) -> String {
    match count {
        CaregiverCount::None => format!(
            "Mi dispiace {name}, non ho nessun caregiver a cui inviare un messaggio di aiuto."
        ),
        CaregiverCount::One => format!(
            "Okay {name}, ho inviato un messaggio al tuo caregiver, ti contatterà al più presto."
        ),
        CaregiverCount::Many => format!(
            "Okay {name}, ho inviato un messaggio ai tuoi caregiver, ti contatteranno al più presto."
        ),
    }
}
