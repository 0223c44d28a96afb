//! Instance-level CRUD and system endpoint integration tests.
//!
//! Exercises rule-driven write routing through the gateway:
//! - Read fall-through across members
//! - Create and update eligibility rules, literal and instance-based
//! - Conditional update and delete, including partial backend failures
//! - Location rewriting and `Prefer: return=minimal`
//! - Capability statement and health endpoints

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use serde_json::{Value, json};

use common::backends::MockBackend;
use common::fixtures::{MRN_SYSTEM, patient, patient_body};
use common::{GATEWAY_BASE, single_member_topology, spawn_gateway, two_member_topology};

const PREFER: HeaderName = HeaderName::from_static("prefer");

/// A two-member topology with explicit Patient rules: `north_rules` is
/// spliced into north's Patient location verbatim.
fn patient_rule_topology(north: &str, south: &str, north_rules: &str) -> String {
    format!(
        r#"
members:
  - id: north
    url: {north}
  - id: south
    url: {south}
resources:
  default:
    locations:
      - member: north
      - member: south
  Patient:
    locations:
      - member: north
        {north_rules}
      - member: south
"#
    )
}

// =============================================================================
// Read
// =============================================================================

mod read {
    use super::*;

    #[tokio::test]
    async fn test_read_falls_through_to_holding_member() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        south.seed(patient("p1", "Smith", "mrn-1"));
        let server = spawn_gateway(&two_member_topology(&north.url(), &south.url())).await;

        let response = server.get("/Patient/p1").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["resourceType"], "Patient");
        assert_eq!(body["id"], "p1");

        // North was asked first and missed.
        assert!(north.requests().contains(&"GET /Patient/p1".to_string()));
    }

    #[tokio::test]
    async fn test_read_unknown_id_is_not_found() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        let server = spawn_gateway(&two_member_topology(&north.url(), &south.url())).await;

        let response = server.get("/Patient/nope").await;
        response.assert_status(StatusCode::NOT_FOUND);

        let outcome: Value = response.json();
        assert_eq!(outcome["resourceType"], "OperationOutcome");
        assert_eq!(outcome["issue"][0]["code"], "not-found");
        assert_eq!(
            outcome["issue"][0]["details"]["text"],
            "Resource Patient/nope not found"
        );
    }
}

// =============================================================================
// Create
// =============================================================================

mod create {
    use super::*;

    #[tokio::test]
    async fn test_create_routes_past_ineligible_member() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        let topology = patient_rule_topology(&north.url(), &south.url(), r#"create: "false""#);
        let server = spawn_gateway(&topology).await;

        let response = server.post("/Patient").json(&patient_body("Smith", "mrn-1")).await;
        response.assert_status(StatusCode::CREATED);

        // South assigned the id; the gateway rewrote the Location header to
        // its own base.
        let body: Value = response.json();
        assert_eq!(body["id"], "srv-1");
        let location = response
            .headers()
            .get(header::LOCATION)
            .expect("missing Location header")
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(location, format!("{}/Patient/srv-1", GATEWAY_BASE));

        assert!(south.stored("Patient", "srv-1").is_some());
        assert_eq!(north.request_count(), 0);
    }

    #[tokio::test]
    async fn test_create_rule_inspects_the_instance() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        let topology = patient_rule_topology(
            &north.url(),
            &south.url(),
            r#"create: "Patient.deceasedBoolean.exists()""#,
        );
        let server = spawn_gateway(&topology).await;

        // A living patient fails north's rule and lands on south.
        server.post("/Patient").json(&patient_body("Alive", "mrn-1")).await;
        assert_eq!(south.stored("Patient", "srv-1").unwrap()["name"][0]["family"], "Alive");

        let mut deceased = patient_body("Gone", "mrn-2");
        deceased["deceasedBoolean"] = json!(true);
        server.post("/Patient").json(&deceased).await;
        assert_eq!(north.stored("Patient", "srv-1").unwrap()["name"][0]["family"], "Gone");
    }

    #[tokio::test]
    async fn test_create_without_eligible_backend_is_unprocessable() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        let topology = format!(
            r#"
members:
  - id: north
    url: {}
  - id: south
    url: {}
resources:
  default:
    locations:
      - member: north
        create: "false"
      - member: south
        create: "false"
"#,
            north.url(),
            south.url()
        );
        let server = spawn_gateway(&topology).await;

        let response = server.post("/Patient").json(&patient_body("Smith", "mrn-1")).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let outcome: Value = response.json();
        assert_eq!(outcome["issue"][0]["code"], "processing");
        assert!(
            outcome["issue"][0]["details"]["text"]
                .as_str()
                .unwrap_or_default()
                .contains("no backend available for create of Patient")
        );
    }

    #[tokio::test]
    async fn test_create_rejects_mismatched_body_type() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        let server = spawn_gateway(&two_member_topology(&north.url(), &south.url())).await;

        let response = server
            .post("/Patient")
            .json(&json!({"resourceType": "Encounter", "status": "planned"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let outcome: Value = response.json();
        assert_eq!(
            outcome["issue"][0]["details"]["text"],
            "Resource type in body (Encounter) does not match resource type in URL (Patient)"
        );
    }

    #[tokio::test]
    async fn test_create_honors_prefer_minimal() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        let server = spawn_gateway(&two_member_topology(&north.url(), &south.url())).await;

        let response = server
            .post("/Patient")
            .add_header(PREFER, HeaderValue::from_static("return=minimal"))
            .json(&patient_body("Smith", "mrn-1"))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.text(), "");
        assert!(response.headers().get(header::LOCATION).is_some());
    }
}

// =============================================================================
// Update
// =============================================================================

mod update {
    use super::*;

    #[tokio::test]
    async fn test_update_writes_through_first_eligible_member() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        let server = spawn_gateway(&two_member_topology(&north.url(), &south.url())).await;

        let response = server.put("/Patient/p1").json(&patient_body("Smith", "mrn-1")).await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["id"], "p1");
        assert!(north.stored("Patient", "p1").is_some());
        assert_eq!(south.request_count(), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_body_id_mismatch() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        let server = spawn_gateway(&two_member_topology(&north.url(), &south.url())).await;

        let response = server.put("/Patient/p1").json(&patient("other", "Smith", "mrn-1")).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let outcome: Value = response.json();
        assert_eq!(
            outcome["issue"][0]["details"]["text"],
            "Resource id in body (other) does not match id in URL (p1)"
        );
    }

    #[tokio::test]
    async fn test_conditional_update_rewrites_matching_instance() {
        let solo = MockBackend::spawn().await;
        solo.seed(patient("p1", "Smith", "mrn-1"));
        let server = spawn_gateway(&single_member_topology(&solo.url())).await;

        let response = server
            .put("/Patient")
            .add_query_param("identifier", format!("{}|mrn-1", MRN_SYSTEM))
            .json(&patient_body("Smythe", "mrn-1"))
            .await;
        response.assert_status_ok();

        let updated = solo.stored("Patient", "p1").unwrap();
        assert_eq!(updated["name"][0]["family"], "Smythe");
    }

    #[tokio::test]
    async fn test_conditional_update_without_match_is_not_found() {
        let solo = MockBackend::spawn().await;
        solo.seed(patient("p1", "Smith", "mrn-1"));
        let server = spawn_gateway(&single_member_topology(&solo.url())).await;

        let response = server
            .put("/Patient")
            .add_query_param("identifier", format!("{}|absent", MRN_SYSTEM))
            .json(&patient_body("Smythe", "absent"))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let outcome: Value = response.json();
        assert_eq!(
            outcome["issue"][0]["details"]["text"],
            "No Patient matches the given criteria"
        );
    }

    #[tokio::test]
    async fn test_conditional_update_requires_criteria() {
        let solo = MockBackend::spawn().await;
        let server = spawn_gateway(&single_member_topology(&solo.url())).await;

        let response = server.put("/Patient").json(&patient_body("Smith", "mrn-1")).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let outcome: Value = response.json();
        assert_eq!(
            outcome["issue"][0]["details"]["text"],
            "Conditional update requires search criteria"
        );
    }

    #[tokio::test]
    async fn test_conditional_update_succeeds_when_any_target_write_succeeds() {
        // The same person is materialized on both members under different
        // ids; south rejects every write.
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn_failing().await;
        north.seed(patient("p-n", "Smith", "mrn-1"));
        south.seed(patient("p-s", "Smith", "mrn-1"));
        let topology = patient_rule_topology(
            &north.url(),
            &south.url(),
            r#"update: "Patient.id = 'p-n'""#,
        );
        let server = spawn_gateway(&topology).await;

        let response = server
            .put("/Patient")
            .add_query_param("identifier", format!("{}|mrn-1", MRN_SYSTEM))
            .json(&patient_body("Smythe", "mrn-1"))
            .await;
        response.assert_status_ok();

        assert_eq!(north.stored("Patient", "p-n").unwrap()["name"][0]["family"], "Smythe");
    }

    #[tokio::test]
    async fn test_conditional_update_surfaces_backend_failure() {
        let solo = MockBackend::spawn_failing().await;
        solo.seed(patient("p1", "Smith", "mrn-1"));
        let server = spawn_gateway(&single_member_topology(&solo.url())).await;

        let response = server
            .put("/Patient")
            .add_query_param("identifier", format!("{}|mrn-1", MRN_SYSTEM))
            .json(&patient_body("Smythe", "mrn-1"))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        // The backend's own outcome body is proxied through.
        let outcome: Value = response.json();
        assert_eq!(outcome["issue"][0]["code"], "exception");
    }
}

// =============================================================================
// Delete
// =============================================================================

mod delete {
    use super::*;

    #[tokio::test]
    async fn test_delete_routes_by_literal_rule() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        south.seed(patient("p1", "Smith", "mrn-1"));
        let topology = patient_rule_topology(&north.url(), &south.url(), r#"delete: "false""#);
        let server = spawn_gateway(&topology).await;

        let response = server.delete("/Patient/p1").await;
        response.assert_status(StatusCode::NO_CONTENT);

        assert!(south.stored("Patient", "p1").is_none());
        assert_eq!(north.request_count(), 0);
    }

    #[tokio::test]
    async fn test_conditional_delete_removes_every_match() {
        let solo = MockBackend::spawn().await;
        solo.seed(patient("p1", "Smith", "mrn-1"));
        solo.seed(patient("p2", "Smith", "mrn-2"));
        let server = spawn_gateway(&single_member_topology(&solo.url())).await;

        let response = server.delete("/Patient?name=Smith").await;
        response.assert_status(StatusCode::NO_CONTENT);

        assert!(solo.stored("Patient", "p1").is_none());
        assert!(solo.stored("Patient", "p2").is_none());
    }

    #[tokio::test]
    async fn test_conditional_delete_without_match_is_not_found() {
        let solo = MockBackend::spawn().await;
        solo.seed(patient("p1", "Smith", "mrn-1"));
        let server = spawn_gateway(&single_member_topology(&solo.url())).await;

        let response = server.delete("/Patient?name=Nobody").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conditional_delete_requires_criteria() {
        let solo = MockBackend::spawn().await;
        let server = spawn_gateway(&single_member_topology(&solo.url())).await;

        let response = server.delete("/Patient").await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let outcome: Value = response.json();
        assert_eq!(
            outcome["issue"][0]["details"]["text"],
            "Conditional delete requires search criteria"
        );
    }
}

// =============================================================================
// System endpoints
// =============================================================================

mod system_endpoints {
    use super::*;

    #[tokio::test]
    async fn test_capability_statement_lists_configured_types() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        let topology = format!(
            r#"
members:
  - id: north
    url: {}
  - id: south
    url: {}
resources:
  default:
    locations:
      - member: north
  Patient:
    locations:
      - member: north
      - member: south
  Encounter:
    locations:
      - member: south
"#,
            north.url(),
            south.url()
        );
        let server = spawn_gateway(&topology).await;

        let response = server.get("/metadata").await;
        response.assert_status_ok();

        let statement: Value = response.json();
        assert_eq!(statement["resourceType"], "CapabilityStatement");
        assert_eq!(statement["fhirVersion"], "4.0.1");

        let resources = statement["rest"][0]["resource"].as_array().unwrap();
        let types: Vec<&str> = resources
            .iter()
            .filter_map(|resource| resource["type"].as_str())
            .collect();
        assert_eq!(types, vec!["Encounter", "Patient"]);

        let interactions: Vec<&str> = resources[0]["interaction"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|interaction| interaction["code"].as_str())
            .collect();
        assert!(interactions.contains(&"read"));
        assert!(interactions.contains(&"search-type"));
    }

    #[tokio::test]
    async fn test_health_reports_member_count() {
        let north = MockBackend::spawn().await;
        let south = MockBackend::spawn().await;
        let server = spawn_gateway(&two_member_topology(&north.url(), &south.url())).await;

        let response = server.get("/health").await;
        response.assert_status_ok();

        let health: Value = response.json();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["members"], 2);
        assert!(health["version"].is_string());

        server.get("/_liveness").await.assert_status_ok();
    }
}
