//! Integration tests for supplier search and ordering.

mod common;

use common::{spawn_app, unique};
use serde_json::{json, Value};

fn names(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn search_matches_name_tax_id_and_email_with_ordering() {
    let app = spawn_app().await;

    let tag = unique("q").replace('-', "");
    let suppliers = [
        json!({ "name": format!("Alfa {}", tag), "tax_id": "900111" }),
        json!({ "name": "Beta Distribuciones", "tax_id": format!("NIT{}", tag) }),
        json!({ "name": "Gamma Lácteos", "email": format!("pagos.{}@example.com", tag) }),
        json!({ "name": format!("Delta {}", unique("other")) }),
    ];
    for body in suppliers {
        let res = app.post_json(&app.admin_token, "/suppliers", body).await;
        assert_eq!(res.status(), 201);
    }

    let res = app
        .get(
            &app.admin_token,
            &format!("/suppliers?q={}&ordering=-name", tag.to_uppercase()),
        )
        .await;
    assert_eq!(res.status(), 200);
    let list: Value = res.json().await.unwrap();
    assert_eq!(
        names(&list),
        vec![
            "Gamma Lácteos".to_string(),
            "Beta Distribuciones".to_string(),
            format!("Alfa {}", tag),
        ]
    );

    let list: Value = app
        .get(&app.admin_token, &format!("/suppliers?q={}&ordering=name", tag))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(names(&list)[0], format!("Alfa {}", tag));

    let list: Value = app
        .get(
            &app.admin_token,
            &format!("/suppliers?q={}&ordering=-password", tag),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(names(&list).len(), 3);
    assert_eq!(names(&list)[0], format!("Alfa {}", tag));
}
