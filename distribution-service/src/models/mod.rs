pub mod analytics;
pub mod customer;
pub mod invoice;
pub mod payment;
pub mod product;
pub mod settings;

pub use analytics::{AnalyticsSummary, MonthlyRevenue, TopCustomer, TopProduct};
pub use customer::{CreateCustomer, Customer, UpdateCustomer};
pub use invoice::{
    CreateInvoice, CreateInvoiceItem, Invoice, InvoiceItem, ListInvoicesFilter, PaymentStatus,
};
pub use payment::{CreatePayment, ListPaymentsFilter, Payment};
pub use product::{CreateProduct, ListProductsFilter, Product, UpdateProduct};
pub use settings::{BusinessSettings, Profile, UpsertBusinessSettings, UpsertProfile};
