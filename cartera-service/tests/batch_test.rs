//! Integration tests for batch payments.

mod common;

use common::{spawn_app, unique, voucher_part};
use reqwest::multipart::Form;
use serde_json::Value;

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn preview_validates_selection() {
    let app = spawn_app().await;

    let pos_name = unique("PDV");
    let pos_id = app.create_point_of_sale(&pos_name).await;
    let first = app.create_supplier("").await;
    let second = app.create_supplier("").await;
    let a = app.create_invoice(first, pos_id, "1000", "pending").await;
    let b = app.create_invoice(first, pos_id, "2500", "pending").await;
    let c = app.create_invoice(second, pos_id, "700", "pending").await;
    let paid = app.create_invoice(first, pos_id, "900", "paid").await;

    let res = app.get(&app.admin_token, "/payments/batch?ids=").await;
    assert_eq!(res.status(), 400);

    let res = app
        .get(&app.admin_token, &format!("/payments/batch?ids={}", paid["invoice_id"]))
        .await;
    assert_eq!(res.status(), 400);

    let res = app
        .get(
            &app.admin_token,
            &format!("/payments/batch?ids={},{}", a["invoice_id"], c["invoice_id"]),
        )
        .await;
    assert_eq!(res.status(), 400);

    let res = app
        .get(
            &app.admin_token,
            &format!(
                "/payments/batch?ids={}%20{},{},x",
                a["invoice_id"], b["invoice_id"], paid["invoice_id"]
            ),
        )
        .await;
    assert_eq!(res.status(), 200);
    let preview: Value = res.json().await.unwrap();
    assert_eq!(preview["supplier_id"], first);
    assert_eq!(preview["invoices"].as_array().unwrap().len(), 2);
    assert_eq!(preview["total"], "3500.00");
    assert_eq!(preview["default_payer"], format!("PDV - {}", pos_name));
    assert_eq!(preview["payer_options"][0], "OFICINA");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn batch_pays_every_invoice_and_emails_once() {
    let app = spawn_app().await;

    let pos_id = app.create_point_of_sale(&unique("PDV")).await;
    let supplier_id = app.create_supplier("lote@example.com").await;
    let a = app.create_invoice(supplier_id, pos_id, "1000", "pending").await;
    let b = app.create_invoice(supplier_id, pos_id, "2000", "pending").await;
    let ids = format!("{},{}", a["invoice_id"], b["invoice_id"]);

    let form = Form::new()
        .text("ids", ids.clone())
        .text("paid_by", "OFICINA")
        .text("payment_date", "2025-04-01")
        .part("voucher", voucher_part());
    let res = app.post_form(&app.admin_token, "/payments/batch", form).await;
    assert_eq!(res.status(), 201);

    let created: Value = res.json().await.unwrap();
    let batch_id = created["batch"]["batch_id"].as_i64().unwrap();
    assert_eq!(created["total"], "3000.00");
    assert_eq!(created["email"]["sent"], true);

    let payments = created["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 2);
    for payment in payments {
        assert_eq!(payment["batch_id"], batch_id);
        assert_eq!(
            payment["notes"],
            format!("Pago perteneciente al Lote #{}.", batch_id)
        );
        assert_eq!(payment["voucher_key"], created["batch"]["voucher_key"]);
    }

    for invoice in [&a, &b] {
        let detail: Value = app
            .get(&app.admin_token, &format!("/invoices/{}", invoice["invoice_id"]))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(detail["invoice"]["status"], "paid");
    }

    let emails: Vec<_> = app
        .mailer
        .sent()
        .into_iter()
        .filter(|e| e.subject.contains(&format!("Lote #{}", batch_id)))
        .collect();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, "lote@example.com");
    assert!(emails[0].text.contains("/payments/batch/confirm/"));

    let form = Form::new()
        .text("ids", ids)
        .text("paid_by", "OFICINA")
        .part("voucher", voucher_part());
    let res = app.post_form(&app.admin_token, "/payments/batch", form).await;
    assert_eq!(res.status(), 400);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn batch_requires_a_voucher() {
    let app = spawn_app().await;

    let pos_id = app.create_point_of_sale(&unique("PDV")).await;
    let supplier_id = app.create_supplier("").await;
    let a = app.create_invoice(supplier_id, pos_id, "1000", "pending").await;

    let form = Form::new()
        .text("ids", a["invoice_id"].to_string())
        .text("paid_by", "OFICINA");
    let res = app.post_form(&app.admin_token, "/payments/batch", form).await;
    assert_eq!(res.status(), 400);

    let detail: Value = app
        .get(&app.admin_token, &format!("/invoices/{}", a["invoice_id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["invoice"]["status"], "pending");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn batch_is_kept_when_supplier_has_no_email() {
    let app = spawn_app().await;

    let pos_id = app.create_point_of_sale(&unique("PDV")).await;
    let supplier_id = app.create_supplier("").await;
    let a = app.create_invoice(supplier_id, pos_id, "1000", "pending").await;

    let form = Form::new()
        .text("ids", a["invoice_id"].to_string())
        .text("paid_by", "OFICINA")
        .part("voucher", voucher_part());
    let res = app.post_form(&app.admin_token, "/payments/batch", form).await;
    assert_eq!(res.status(), 201);

    let created: Value = res.json().await.unwrap();
    assert_eq!(created["email"]["sent"], false);
    assert!(created["email"]["message"]
        .as_str()
        .unwrap()
        .contains("no email"));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL (TEST_DATABASE_URL)
async fn cashier_batch_ignores_other_points_of_sale() {
    let app = spawn_app().await;

    let own = app.create_point_of_sale(&unique("PDV")).await;
    let other = app.create_point_of_sale(&unique("PDV")).await;
    let supplier_id = app.create_supplier("").await;
    let mine = app.create_invoice(supplier_id, own, "1000", "pending").await;
    let theirs = app.create_invoice(supplier_id, other, "5000", "pending").await;
    let token = app.create_cashier(Some(own)).await;

    let res = app
        .get(
            &token,
            &format!(
                "/payments/batch?ids={},{}",
                mine["invoice_id"], theirs["invoice_id"]
            ),
        )
        .await;
    assert_eq!(res.status(), 200);
    let preview: Value = res.json().await.unwrap();
    assert_eq!(preview["invoices"].as_array().unwrap().len(), 1);
    assert_eq!(preview["total"], "1000.00");
}
