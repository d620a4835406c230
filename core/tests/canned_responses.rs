//! Drive the one-shot client methods through an in-process transport that
//! checks the outgoing request and answers with a canned response.

use chrono::{FixedOffset, TimeZone, Utc};
use okr_core::{
    ApiError, HttpMethod, HttpRequest, HttpResponse, KeyResult, Objective, OkrClient, Operation,
    Period, ProgressDefinition, Response, TransportError, Unit, Update,
};

const TOKEN: &str = "foobar-token";
const HOST: &str = "https://okr-for-jira-prod.herokuapp.com";

/// A transport asserting the request URL and token, then replying with
/// `status` and `body`.
fn canned(
    expected_url: String,
    status: u16,
    body: &'static str,
) -> impl Fn(HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync {
    move |req: HttpRequest| {
        assert_eq!(req.url, expected_url);
        assert_eq!(req.header("API-Token"), Some(TOKEN));
        assert_eq!(req.header("Accept"), Some("application/json"));
        Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        })
    }
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Option<chrono::DateTime<Utc>> {
    Some(Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap())
}

const OBJECTIVES_BY_DATE_BODY: &str = r#"{
    "okrs": [
        {
            "id": "5fda249d289742000406b3e4",
            "key": "O-2",
            "name": "Become more mature company",
            "description": "<p>This quarter we will be focusing on improving our performance.</p><p></p>",
            "parentObjectiveId": null,
            "ownerAccountId": "5c12ad9fd3af3b1ccfecbf55",
            "collaboratorAccountIds": [],
            "percentDone": 8.333333333333332,
            "created": "2020-12-16T15:15:41+0000",
            "startDate": "2021-01-01T00:00:00+0000",
            "deadline": "2021-03-31T23:59:59+0000",
            "labelIds": [],
            "teamIds": [],
            "krIds": ["6061e921e2f4470003bc3210"],
            "childObjectiveIds": ["5fdb72c63d2cf000035ceb37"],
            "latestUpdate": {
                "entityId": "5fda249d289742000406b3e4",
                "status": "ON_TRACK",
                "created": "2021-05-05T12:15:14+0000",
                "value": null,
                "description": ""
            },
            "periodAliasId": "602a6a2717378700039f342a",
            "weight": 0
        }
    ],
    "krs": [
        {
            "id": "6061e921e2f4470003bc3210",
            "key": "KR-9",
            "name": "different start date",
            "description": null,
            "parentObjectiveId": "5fda249d289742000406b3e4",
            "issueIds": ["10000"],
            "ownerAccountId": "5dbfee8570f1ea0df7698353",
            "collaboratorAccountIds": [],
            "percentDone": 0.0,
            "created": "2021-03-29T14:50:09+0000",
            "startDate": "2020-04-01T00:00:00+0000",
            "deadline": "2020-06-30T23:59:59+0000",
            "labelIds": [],
            "teamIds": [],
            "periodAliasId": null,
            "latestUpdate": {
                "entityId": "61138f2be5fd454858c3e1ee",
                "status": "AT_RISK",
                "created": "2021-08-11T08:49:47+0000",
                "value": 0.0,
                "description": null
            },
            "unit": {"name": "USD", "symbol": "$"},
            "currentProgressDefinition": {
                "type": "STANDARD",
                "startValue": 0.0,
                "desiredValue": 1.0,
                "jql": null
            },
            "weight": 1
        }
    ],
    "teams": [],
    "periods": [
        {
            "id": "602a6a2717378700039f342a",
            "name": "Q1 Y2021",
            "startDate": "2021-01-01T00:00:00+0000",
            "deadline": "2021-03-31T23:59:59+0000"
        }
    ],
    "labels": []
}"#;

#[test]
fn objectives_by_date_decodes_full_envelope() {
    let url = format!(
        "{HOST}/api/v2/api-export/objectives/byDate?startDateEpochMilli=1409459200000&deadlineEpochMilli=1748647410000&expand=KEY_RESULTS,TEAMS,PERIODS,LABELS"
    );
    let client = OkrClient::with_transport(canned(url, 200, OBJECTIVES_BY_DATE_BODY), TOKEN);

    let paris = FixedOffset::east_opt(2 * 3600).unwrap();
    let start = paris.with_ymd_and_hms(2014, 8, 31, 6, 26, 40).unwrap();
    let deadline = paris.with_ymd_and_hms(2025, 5, 31, 1, 23, 30).unwrap();
    let got = client
        .objectives_by_date(&start, &deadline, &["KEY_RESULTS", "TEAMS", "PERIODS", "LABELS"])
        .unwrap();

    let want = Response {
        objectives: vec![Objective {
            id: "5fda249d289742000406b3e4".to_string(),
            key: "O-2".to_string(),
            name: "Become more mature company".to_string(),
            description: "<p>This quarter we will be focusing on improving our performance.</p><p></p>".to_string(),
            parent_objective_id: String::new(),
            owner_account_id: "5c12ad9fd3af3b1ccfecbf55".to_string(),
            collaborator_account_ids: Vec::new(),
            percent_done: 8.333333333333332,
            created: utc(2020, 12, 16, 15, 15, 41),
            start_date: utc(2021, 1, 1, 0, 0, 0),
            deadline: utc(2021, 3, 31, 23, 59, 59),
            label_ids: Vec::new(),
            team_ids: Vec::new(),
            key_result_ids: vec!["6061e921e2f4470003bc3210".to_string()],
            child_objective_ids: vec!["5fdb72c63d2cf000035ceb37".to_string()],
            latest_update: Update {
                entity_id: "5fda249d289742000406b3e4".to_string(),
                status: "ON_TRACK".to_string(),
                created: utc(2021, 5, 5, 12, 15, 14),
                value: 0.0,
                description: String::new(),
            },
            period_alias_id: "602a6a2717378700039f342a".to_string(),
            weight: 0.0,
        }],
        key_results: vec![KeyResult {
            id: "6061e921e2f4470003bc3210".to_string(),
            key: "KR-9".to_string(),
            name: "different start date".to_string(),
            description: String::new(),
            parent_objective_id: "5fda249d289742000406b3e4".to_string(),
            issue_ids: vec!["10000".to_string()],
            owner_account_id: "5dbfee8570f1ea0df7698353".to_string(),
            collaborator_account_ids: Vec::new(),
            percent_done: 0.0,
            created: utc(2021, 3, 29, 14, 50, 9),
            start_date: utc(2020, 4, 1, 0, 0, 0),
            deadline: utc(2020, 6, 30, 23, 59, 59),
            label_ids: Vec::new(),
            team_ids: Vec::new(),
            period_alias_id: String::new(),
            latest_update: Update {
                entity_id: "61138f2be5fd454858c3e1ee".to_string(),
                status: "AT_RISK".to_string(),
                created: utc(2021, 8, 11, 8, 49, 47),
                value: 0.0,
                description: String::new(),
            },
            unit: Unit {
                name: "USD".to_string(),
                symbol: "$".to_string(),
            },
            current_progress_definition: ProgressDefinition {
                progress_type: "STANDARD".to_string(),
                start_value: 0.0,
                desired_value: 1.0,
                jql: String::new(),
            },
            weight: 1.0,
        }],
        teams: Vec::new(),
        periods: vec![Period {
            id: "602a6a2717378700039f342a".to_string(),
            name: "Q1 Y2021".to_string(),
            start_date: utc(2021, 1, 1, 0, 0, 0),
            deadline: utc(2021, 3, 31, 23, 59, 59),
        }],
        labels: Vec::new(),
    };
    assert_eq!(got, want);
}

#[test]
fn update_objective_decodes_echo() {
    let url = format!("{HOST}/api/v2/api-update/objectives");
    let client = OkrClient::with_transport(
        canned(
            url,
            200,
            r#"{
                "entityId": "62334eac00ee2b102e34fdb7",
                "status": "ON TRACK",
                "created": "2022-05-20T09:58:09+0000",
                "value": null,
                "description": "Spaceship assembly docks are delivering on time"
            }"#,
        ),
        TOKEN,
    );

    let got = client
        .update_objective(
            "62334eac00ee2b102e34fdb7",
            "ON TRACK",
            "Spaceship assembly docks are delivering on time",
        )
        .unwrap();
    assert_eq!(
        got,
        Update {
            entity_id: "62334eac00ee2b102e34fdb7".to_string(),
            status: "ON TRACK".to_string(),
            created: utc(2022, 5, 20, 9, 58, 9),
            value: 0.0,
            description: "Spaceship assembly docks are delivering on time".to_string(),
        }
    );
}

#[test]
fn update_key_result_echoes_payload() {
    const ID: &str = "62384a6942adda046598b3bd";
    const DESCRIPTION: &str =
        "Reduction in ship hull output is caused by Unobtainium supply disruptions.";

    // Echo the posted payload back the way the service does.
    let client = OkrClient::with_transport(
        |req: HttpRequest| -> Result<HttpResponse, TransportError> {
            assert_eq!(req.method, HttpMethod::Post);
            assert_eq!(req.url, format!("{HOST}/api/v2/api-update/keyResults"));
            let sent: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            let body = serde_json::json!({
                "entityId": sent["keyResultId"],
                "status": sent["status"],
                "created": "2022-05-20T13:01:35+0000",
                "value": sent["newValue"],
                "description": sent["description"],
            });
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: body.to_string(),
            })
        },
        TOKEN,
    );

    let got = client
        .update_key_result(ID, "AT RISK", 13500.5, DESCRIPTION)
        .unwrap();
    assert_eq!(got.entity_id, ID);
    assert_eq!(got.status, "AT RISK");
    assert_eq!(got.value, 13500.5);
    assert_eq!(got.description, DESCRIPTION);
    assert_eq!(got.created, utc(2022, 5, 20, 13, 1, 35));
}

#[test]
fn server_error_on_every_export_call() {
    let client = OkrClient::with_transport(
        |_req: HttpRequest| -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status: 500,
                headers: Vec::new(),
                body: "database unavailable".to_string(),
            })
        },
        TOKEN,
    );
    let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let deadline = Utc.with_ymd_and_hms(2021, 12, 31, 0, 0, 0).unwrap();
    let expand = ["TEAMS"];

    let results = [
        (Operation::ObjectivesByDate, client.objectives_by_date(&start, &deadline, &expand)),
        (Operation::ObjectivesByIds, client.objectives_by_ids(&["o1"], &expand)),
        (Operation::KeyResultsByDate, client.key_results_by_date(&start, &deadline, &expand)),
        (Operation::KeyResultsByIds, client.key_results_by_ids(&["k1"], &expand)),
    ];
    for (operation, result) in results {
        let err = result.unwrap_err();
        assert_eq!(err.operation(), operation);
        assert_eq!(err.status(), Some(500));
        let message = err.to_string();
        assert!(message.contains("500"), "{message}");
        assert!(message.contains("database unavailable"), "{message}");
        assert!(message.starts_with(&format!("failed to {operation}: ")), "{message}");
    }
}

#[test]
fn malformed_body_is_a_decode_error() {
    let url = format!("{HOST}/api/v2/api-export/keyResults/byIds?keyResultIds=k1&expand=");
    let client = OkrClient::with_transport(canned(url, 200, r#"{"krs": [{"id": 1}]}"#), TOKEN);

    let err = client
        .key_results_by_ids(&["k1"], &[] as &[&str])
        .unwrap_err();
    assert!(matches!(err.kind(), ApiError::DeserializationError(_)));
}

#[test]
fn timeouts_surface_as_transport_errors() {
    let client = OkrClient::with_transport(
        |_req: HttpRequest| -> Result<HttpResponse, TransportError> { Err(TransportError::Timeout) },
        TOKEN,
    );
    let err = client
        .update_key_result("k1", "ON TRACK", 1.0, "")
        .unwrap_err();
    assert!(matches!(err.kind(), ApiError::Transport(TransportError::Timeout)));
    assert_eq!(err.to_string(), "failed to update the key result: request timed out");
}
