//! End-to-end scenarios through the public API.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ldifgen::{
    DataFormat, FieldSpec, FieldType, GenerationOptions, JobError, JobInput, JobManager, JobStatus, LdapMapping,
    ParseOptions, Schema, SchemaError,
};

/// Unfold an LDIF document and decode it into `(dn, attributes)` pairs.
fn read_ldif(text: &str) -> Vec<(String, Vec<(String, String)>)> {
    let mut unfolded: Vec<String> = Vec::new();
    for line in text.lines() {
        match line.strip_prefix(' ') {
            Some(continuation) => unfolded.last_mut().expect("continuation without line").push_str(continuation),
            None => unfolded.push(line.to_string()),
        }
    }

    let mut entries = Vec::new();
    for block in unfolded.split(|line| line.is_empty()) {
        if block.is_empty() {
            continue;
        }
        let mut pairs = block.iter().map(|line| {
            if let Some((name, value)) = line.split_once(":: ") {
                let decoded = STANDARD.decode(value).expect("valid base64");
                (name.to_string(), String::from_utf8(decoded).expect("utf-8 value"))
            } else {
                let (name, value) = line.split_once(": ").expect("attribute line");
                (name.to_string(), value.to_string())
            }
        });
        let (dn_key, dn) = pairs.next().expect("dn line");
        assert_eq!(dn_key, "dn");
        entries.push((dn, pairs.collect()));
    }
    entries
}

#[test]
fn scenario_a_single_user_csv() {
    let manager = JobManager::default();
    let csv = "id,name,email,age\n1,John Doe,john@example.com,25";
    let options = GenerationOptions {
        base_dn: "dc=example,dc=com".into(),
        ..Default::default()
    };

    let job = manager.generate_now(JobInput::csv(csv), "user", options).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.summary.as_ref().unwrap().valid_records, 1);

    let ldif = job.output.unwrap();
    assert_eq!(ldif.lines().next(), Some("dn: uid=1,dc=example,dc=com"));
    assert!(ldif.contains("cn: John Doe\n"));
    assert!(ldif.contains("sn: Doe\n"));
    assert!(ldif.contains("mail: john@example.com\n"));
    assert!(ldif.ends_with('\n') && !ldif.ends_with("\n\n"));
}

#[test]
fn scenario_b_invalid_email_in_wrapped_json() {
    let manager = JobManager::default();
    let json = r#"{"data":[{"id":1,"name":"A","email":"bad"}]}"#;

    let result = manager
        .parse(json.as_bytes(), DataFormat::Json, "user", &ParseOptions::default())
        .unwrap();

    assert_eq!(result.summary.invalid_records, 1);
    assert_eq!(result.summary.errors.len(), 1);
    assert_eq!(result.summary.errors[0].field, "email");
    assert_eq!(result.summary.errors[0].value, serde_json::json!("bad"));
    assert!(result.records.is_empty());
}

#[test]
fn scenario_c_create_then_process_three_records() {
    let manager = JobManager::default();
    let csv = "id,name,email\n1,Ann Lee,ann@example.com\n2,Bo Chen,bo@example.com\n3,Cy Diaz,cy@example.com\n";

    let job = manager
        .create(JobInput::csv(csv), "user", GenerationOptions::default())
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress_percentage, 0);
    assert!(job.started_at.is_none());

    let done = manager.process(&job.job_id).unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.input_records, 3);
    assert_eq!(done.output_records, 3);
    assert_eq!(done.progress_percentage, 100);
    assert!(done.started_at.unwrap() <= done.completed_at.unwrap());

    assert_eq!(manager.get(&job.job_id).unwrap(), done);
    let result = manager.result(&job.job_id).unwrap();
    assert_eq!(result.output_records, 3);
    assert_eq!(read_ldif(&result.output).len(), 3);
}

#[test]
fn scenario_e_unknown_schema_creates_no_job() {
    let manager = JobManager::default();
    let err = manager
        .create(JobInput::csv("id\n1\n"), "employee", GenerationOptions::default())
        .unwrap_err();

    assert_eq!(err, JobError::Schema(SchemaError::NotFound("employee".into())));
    assert!(manager.list(None).is_empty());
}

#[test]
fn ldif_round_trip_recovers_values() {
    let manager = JobManager::default();
    let long_name = format!("Zoë {}", "Lindqvist-".repeat(8));
    let json = serde_json::json!([
        {"id": 1, "name": "John Doe", "email": "john@example.com", "age": 25},
        {"id": 2, "name": long_name, "email": "zoe@example.com"},
        {"id": 3, "name": " Leading Space", "email": "lead@example.com"}
    ])
    .to_string();

    let job = manager
        .generate_now(JobInput::json(json), "user", GenerationOptions::default())
        .unwrap();
    let ldif = job.output.unwrap();
    assert!(ldif.lines().all(|line| line.chars().count() <= 76));

    let entries = read_ldif(&ldif);
    assert_eq!(entries.len(), 3);

    let (dn, attributes) = &entries[1];
    assert_eq!(dn, "uid=2,dc=example,dc=com");
    assert!(attributes.contains(&("cn".to_string(), long_name.clone())));
    assert!(attributes.contains(&("sn".to_string(), "Lindqvist-".repeat(8))));

    // leading space forces base64, and survives the round trip
    assert!(ldif.contains("cn:: IExlYWRpbmcgU3BhY2U="));
    let (_, attributes) = &entries[2];
    assert!(attributes.contains(&("cn".to_string(), " Leading Space".to_string())));
}

#[test]
fn generate_twice_is_byte_identical() {
    let manager = JobManager::default();
    let csv = "id,name,email\n1,Ann Lee,ann@example.com\n2,Bo Chen,bo@example.com\n";
    let parsed = manager
        .parse(csv.as_bytes(), DataFormat::Csv, "user", &ParseOptions::default())
        .unwrap();

    let options = GenerationOptions::default();
    let first = manager.generate(&parsed.records, "user", &options).unwrap().to_ldif();
    let second = manager.generate(&parsed.records, "user", &options).unwrap().to_ldif();
    assert_eq!(first, second);
}

#[test]
fn counts_and_error_cap_hold() {
    let manager = JobManager::default();
    let mut csv = String::from("id,name,email,age\n");
    for i in 0..40 {
        if i % 3 == 0 {
            csv.push_str(&format!("{},Valid Person,v{}@example.com,30\n", i, i));
        } else {
            csv.push_str(&format!("{},,broken,-5\n", i));
        }
    }

    for max_errors in [0, 1, 7, 1000] {
        let options = ParseOptions {
            max_errors,
            ..Default::default()
        };
        let result = manager
            .parse(csv.as_bytes(), DataFormat::Csv, "user", &options)
            .unwrap();
        let summary = &result.summary;

        assert_eq!(summary.valid_records + summary.invalid_records, summary.total_records);
        assert_eq!(summary.total_records, 40);
        assert_eq!(summary.invalid_records, 26);
        assert!(summary.errors.len() <= max_errors);
        assert_eq!(summary.truncated, max_errors < 26 * 3);
    }
}

#[test]
fn output_never_exceeds_input() {
    let manager = JobManager::default();
    let csv = "id,name,email\n1,Ann Lee,ann@example.com\n2,,bad\n3,Cy Diaz,cy@example.com\n";
    let job = manager
        .generate_now(JobInput::csv(csv), "user", GenerationOptions::default())
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.input_records, 3);
    assert_eq!(job.output_records, 2);
    assert!(job.output_records <= job.input_records);
}

#[test]
fn custom_schema_with_mapping() {
    let manager = JobManager::default();
    let schema = Schema::new("device")
        .field("serial", FieldSpec::new(FieldType::String).required())
        .field("owner_phone", FieldSpec::new(FieldType::Phone))
        .field("purchased", FieldSpec::new(FieldType::Date))
        .ldap(
            LdapMapping::new("serial")
                .naming_attribute("cn")
                .object_classes(["device"])
                .map("owner_phone", "telephoneNumber"),
        );
    manager.register_schema(schema.clone()).unwrap();
    assert!(matches!(manager.register_schema(schema), Err(SchemaError::Duplicate(_))));

    let csv = "serial;owner_phone;purchased\nSN-001;+1 (555) 010-9999;03/04/2024\n";
    let options = GenerationOptions {
        base_dn: "ou=devices,dc=acme,dc=org".into(),
        object_classes: vec!["ieee802Device".into(), "DEVICE".into()],
        ..Default::default()
    };
    let job = manager.generate_now(JobInput::csv(csv), "device", options).unwrap();

    assert_eq!(
        job.output.unwrap(),
        "dn: cn=SN-001,ou=devices,dc=acme,dc=org\n\
         objectClass: top\n\
         objectClass: device\n\
         objectClass: ieee802Device\n\
         cn: SN-001\n\
         telephoneNumber: +1 (555) 010-9999\n\
         purchased: 2024-03-04\n"
    );
}

#[test]
fn attribute_names_are_checked_at_registration() {
    let manager = JobManager::default();
    let schema = Schema::new("notes")
        .field("id", FieldSpec::new(FieldType::Integer).required())
        .field("a: b", FieldSpec::new(FieldType::String));
    assert!(matches!(manager.register_schema(schema), Err(SchemaError::Invalid { .. })));
    assert!(manager.get_schema("notes").is_err());

    let csv = "id,name,price,category,in_stock\n7,Desk Lamp,19.5,lighting,no\n";
    let job = manager
        .generate_now(JobInput::csv(csv), "product", GenerationOptions::default())
        .unwrap();
    let ldif = job.output.unwrap();
    assert!(ldif.contains("\ninStock: FALSE\n"));
    for (_, attributes) in read_ldif(&ldif) {
        assert!(attributes.iter().all(|(name, _)| ldifgen::ldif::is_attribute_name(name)));
    }
}

#[test]
fn duplicate_csv_header_fails_the_job() {
    let manager = JobManager::default();
    let csv = "id,name,email,name\n1,John Doe,john@example.com,\n";

    let err = manager
        .parse(csv.as_bytes(), DataFormat::Csv, "user", &ParseOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("Duplicate CSV header 'name'"));

    let job = manager
        .generate_now(JobInput::csv(csv), "user", GenerationOptions::default())
        .unwrap();
    assert_eq!(job.input_records, 0);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("Duplicate CSV header"));
}
