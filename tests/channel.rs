//! Channel integration tests
//!
//! Tests the caregiver command format and notifier contracts without network access

use care_companion::{
    Error,
    channels::{CaregiverCommand, Notifier, TelegramGateway, UnconfiguredNotifier},
    controller::Feeling,
    patient::{CaregiverCount, PatientRegistry},
};

#[tokio::test]
async fn test_unconfigured_notifier_fails_delivery() {
    let err = UnconfiguredNotifier
        .notify("42", &CaregiverCommand::help_request("Maria"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotificationDeliveryFailed { ref chat_id, .. } if chat_id == "42"));
}

#[test]
fn test_gateway_requires_token() {
    assert!(TelegramGateway::new("").is_err());
    assert!(TelegramGateway::new("   ").is_err());
    assert!(TelegramGateway::new("123:abc").is_ok());
}

#[test]
fn test_command_wire_forms_parse_back() {
    let at = chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(20, 30, 0)
        .unwrap();
    let commands = [
        CaregiverCommand::Start,
        CaregiverCommand::Help,
        CaregiverCommand::help_request("Anna Maria"),
        CaregiverCommand::recap("Anna Maria", Feeling::Bad, at).unwrap(),
    ];

    for command in commands {
        let wire = command.to_string();
        assert_eq!(wire.parse::<CaregiverCommand>().unwrap(), command, "{wire}");
    }
}

#[test]
fn test_recap_renders_italian_day() {
    let command: CaregiverCommand = "/sendrecap<Maria><male><sunday-07:05>".parse().unwrap();
    assert_eq!(
        command.render(),
        "Ecco il recap per Maria.\nSi sente male.\nDomenica alle 07:05 ha preso i seguenti farmaci:"
    );
}

#[test]
fn test_registry_builds_patient() {
    let registry = PatientRegistry::parse(
        r#"
        name = "Maria"
        gender = "F"
        age = 82
        caregiver_handles = ["@giulia", "luca"]
        caregiver_chat_ids = ["555", "555"]
        "#,
    )
    .unwrap();

    assert_eq!(registry.handles(), vec!["giulia", "luca"]);

    let patient = registry.into_patient(vec!["111".to_string()]);
    assert_eq!(patient.name, "Maria");
    assert_eq!(patient.age, Some(82));
    assert_eq!(patient.caregivers(), ["555", "111"]);
    assert_eq!(patient.caregiver_count(), CaregiverCount::Many);
}
