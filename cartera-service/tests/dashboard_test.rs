//! Integration tests for the dashboard and the staff analytics report.

mod common;

use common::{spawn_app, unique};
use serde_json::Value;

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn dashboard_is_scoped_and_ordered_by_balance() {
    let app = spawn_app().await;

    let pos_id = app.create_point_of_sale(&unique("PDV")).await;
    let other = app.create_point_of_sale(&unique("PDV")).await;
    let token = app.create_cashier(Some(pos_id)).await;
    let small = app.create_supplier("").await;
    let large = app.create_supplier("").await;
    app.create_invoice(small, pos_id, "100", "pending").await;
    app.create_invoice(large, pos_id, "700", "pending").await;
    app.create_invoice(large, pos_id, "300", "pending").await;
    app.create_invoice(large, other, "9999", "pending").await;
    app.create_invoice(small, pos_id, "5000", "paid").await;

    let res = app.get(&token, "/dashboard").await;
    assert_eq!(res.status(), 200);
    let summary: Value = res.json().await.unwrap();
    assert_eq!(summary["total_pending"], "1100.00");
    assert_eq!(summary["pending_count"], 3);
    assert_eq!(summary["suppliers_with_balance"], 2);
    assert_eq!(summary["by_supplier"][0]["supplier_id"], large);
    assert_eq!(summary["by_supplier"][0]["total"], "1000.00");
    assert_eq!(summary["by_supplier"][1]["supplier_id"], small);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn unassigned_user_dashboard_is_empty() {
    let app = spawn_app().await;

    let token = app.create_cashier(None).await;
    let summary: Value = app.get(&token, "/dashboard").await.json().await.unwrap();
    assert_eq!(summary["pending_count"], 0);
    assert_eq!(summary["total_pending"], "0");
    assert!(summary["by_supplier"].as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn analytics_is_staff_only() {
    let app = spawn_app().await;

    let pos_id = app.create_point_of_sale(&unique("PDV")).await;
    let token = app.create_cashier(Some(pos_id)).await;
    let res = app.get(&token, "/analytics").await;
    assert_eq!(res.status(), 403);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn analytics_filters_by_point_of_sale_and_dates() {
    let app = spawn_app().await;

    let pos_id = app.create_point_of_sale(&unique("PDV")).await;
    let supplier_id = app.create_supplier("").await;
    app.create_invoice(supplier_id, pos_id, "1000", "paid").await;
    app.create_invoice(supplier_id, pos_id, "500", "pending").await;

    let res = app
        .get(
            &app.admin_token,
            &format!("/analytics?pdv={}&d1=2025-03-01&d2=2025-03-31", pos_id),
        )
        .await;
    assert_eq!(res.status(), 200);
    let report: Value = res.json().await.unwrap();

    assert_eq!(report["filters"]["pos_id"], pos_id);
    assert_eq!(report["filters"]["date_from"], "2025-03-01");
    assert_eq!(report["total_purchases"], "1500.00");
    assert_eq!(report["invoice_count"], 2);
    assert_eq!(report["total_paid"], "1000.00");
    assert_eq!(report["by_month"][0]["month"], "2025-03-01");
    assert_eq!(report["top_suppliers"][0]["id"], supplier_id);
    assert!(report["points_of_sale"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["id"] == pos_id));

    let report: Value = app
        .get(
            &app.admin_token,
            &format!("/analytics?pos={}&d1=2025-04-01&d2=not-a-date", pos_id),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(report["invoice_count"], 0);
}
