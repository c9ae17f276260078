//! Domain models for cartera-service.

mod batch;
mod invoice;
mod payment;
mod point_of_sale;
mod report;
mod supplier;
mod user;

pub use batch::{CreateBatch, PaymentBatch};
pub use invoice::{
    CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter, PendingInvoicesFilter,
    UpdateInvoice,
};
pub use payment::{
    is_cash_note as payment_is_cash_note, CreatePayment, ListPaymentsFilter, Payment,
    CASH_PAYMENT_MARKER,
};
pub use point_of_sale::{CreatePointOfSale, PointOfSale};
pub use report::{
    parse_id, AnalyticsFilter, InvoiceRanking, KpiTotals, MonthlyPurchases, NamedTotal,
    SupplierBalance,
};
pub use supplier::{CreateSupplier, Supplier, SupplierOrdering};
pub use user::{CreateUser, User};

/// Page size used by every paginated listing.
pub const PAGE_SIZE: i64 = 25;
