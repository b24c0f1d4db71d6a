//! Shared test utilities for `jprint`.
//!
//! Helpers for an in-memory database, session users, and orders with a known OTP.

use crate::{
    core::{
        cart::{FileItem, ItemKind, PrintSettings},
        identity::SessionUser,
        orders::OrderView,
        otp::{Otp, OtpGenerator},
        pricing::PriceSheet,
        submission::{self, NewOrder, SubmissionPolicy},
    },
    entities::{Order, order, order::OrderStatus},
    errors::{Error, Result},
};
use sea_orm::{DatabaseConnection, Set, prelude::*};
use std::sync::Mutex;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A file-backed `SQLite` database in the temp dir, for tests that need more than
/// one connection. Remove the returned path when done.
pub async fn setup_file_db() -> Result<(DatabaseConnection, std::path::PathBuf)> {
    let path = std::env::temp_dir().join(format!("jprint-test-{}.sqlite", uuid::Uuid::new_v4()));
    let db = sea_orm::Database::connect(format!("sqlite://{}?mode=rwc", path.display())).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, path))
}

/// A student session with a predictable email.
pub fn test_student(id: &str) -> SessionUser {
    SessionUser::user(id, format!("{id}@campus.edu"), format!("Student {id}"))
}

/// The print shop desk.
pub fn test_vendor() -> SessionUser {
    SessionUser::vendor("vendor-1", "desk@campus.edu", "Print Desk")
}

/// Hands out a fixed sequence of codes, then keeps repeating the last one.
pub struct FixedOtps {
    codes: Vec<Otp>,
    next: Mutex<usize>,
}

impl FixedOtps {
    /// # Panics
    /// If any code is not 4 digits or the list is empty.
    #[allow(clippy::unwrap_used)]
    pub fn new<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        let codes: Vec<Otp> = codes.into_iter().map(|c| c.parse().unwrap()).collect();
        assert!(!codes.is_empty(), "FixedOtps needs at least one code");
        Self {
            codes,
            next: Mutex::new(0),
        }
    }
}

impl OtpGenerator for FixedOtps {
    #[allow(clippy::unwrap_used)]
    fn generate(&self) -> Otp {
        let mut next = self.next.lock().unwrap();
        let otp = self.codes[(*next).min(self.codes.len() - 1)].clone();
        *next += 1;
        otp
    }
}

/// A two-line order: a `pages`-page PDF followed by a pen priced 10.
///
/// `pages == 0` leaves the document unresolved. The total is the one the
/// default price sheet would compute.
pub fn sample_new_order(user_id: &str, pages: u32) -> NewOrder {
    let files = vec![
        FileItem {
            id: format!("{user_id}-doc"),
            name: "lecture.pdf".to_string(),
            size: 52_000,
            kind: ItemKind::Document {
                mime_type: "application/pdf".to_string(),
            },
            page_count: pages,
            payload_ref: None,
        },
        FileItem {
            id: format!("{user_id}-pen"),
            name: "Blue Pen".to_string(),
            size: 0,
            kind: ItemKind::Stationery { price: 10 },
            page_count: 0,
            payload_ref: None,
        },
    ];
    let settings = PrintSettings::default();
    let total_amount = PriceSheet::default().total_for(&files, &settings);

    NewOrder {
        files,
        settings,
        total_amount,
        user_id: user_id.to_string(),
        user_email: format!("{user_id}@campus.edu"),
        client_ref: None,
    }
}

/// Places a 3-page sample order for `user_id` holding `otp`.
pub async fn create_test_order_with_otp(
    db: &DatabaseConnection,
    user_id: &str,
    otp: &str,
) -> Result<OrderView> {
    let placed = submission::create_order(
        db,
        sample_new_order(user_id, 3),
        &FixedOtps::new([otp]),
        &SubmissionPolicy::default(),
    )
    .await?;
    Ok(placed.order)
}

/// Overwrites an order's status without going through the transition guards.
pub async fn set_status_directly(
    db: &DatabaseConnection,
    order_id: i64,
    status: OrderStatus,
) -> Result<()> {
    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or(Error::OrderNotFound { id: order_id })?;
    let mut active: order::ActiveModel = order.into();
    active.status = Set(status);
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await?;
    Ok(())
}

/// Bytes shaped like a PDF with `pages` page objects under one page tree.
pub fn fake_pdf(pages: usize) -> Vec<u8> {
    let mut pdf = b"%PDF-1.4\n1 0 obj << /Type /Pages /Count 0 >> endobj\n".to_vec();
    for i in 0..pages {
        pdf.extend_from_slice(
            format!("{} 0 obj << /Type /Page /Parent 1 0 R >> endobj\n", i + 2).as_bytes(),
        );
    }
    pdf.extend_from_slice(b"%%EOF");
    pdf
}
