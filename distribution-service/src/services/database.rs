//! Database service for distribution-service.
//!
//! One method per operation, all scoped by `tenant_id`. Writes that touch the
//! invoice balance (recording or deleting a payment, creating an invoice with
//! its items) run in a single transaction so the reconciliation invariant
//! holds under partial failure.

use crate::models::{
    AnalyticsSummary, BusinessSettings, CreateCustomer, CreateInvoice, CreatePayment,
    CreateProduct, Customer, Invoice, InvoiceItem, ListInvoicesFilter, ListPaymentsFilter,
    ListProductsFilter, MonthlyRevenue, Payment, PaymentStatus, Product, Profile, TopCustomer,
    TopProduct, UpdateCustomer, UpdateProduct, UpsertBusinessSettings, UpsertProfile,
};
use crate::models::invoice::generate_invoice_number;
use crate::services::metrics::{DB_QUERY_DURATION, ERRORS_TOTAL};
use crate::services::reconciler;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "invoice_id, tenant_id, customer_id, invoice_number, invoice_date, \
     due_date, subtotal, discount_amount, tax_amount, total_amount, paid_amount, payment_status, \
     notes, created_utc";

const PRODUCT_COLUMNS: &str = "product_id, tenant_id, name, category, brand, cost_price, \
     selling_price, stock_quantity, barcode, expiry_date, created_utc";

const CUSTOMER_COLUMNS: &str = "customer_id, tenant_id, shop_name, owner_name, phone, address, \
     latitude, longitude, outstanding_balance, created_utc";

const PAYMENT_COLUMNS: &str =
    "payment_id, tenant_id, invoice_id, payment_date, amount, payment_method, notes, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "distribution-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    /// Create a new product.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id))]
    pub async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let product_id = Uuid::new_v4();
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (product_id, tenant_id, name, category, brand, cost_price,
                selling_price, stock_quantity, barcode, expiry_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(input.tenant_id)
        .bind(&input.name)
        .bind(&input.category)
        .bind(&input.brand)
        .bind(input.cost_price)
        .bind(input.selling_price)
        .bind(input.stock_quantity)
        .bind(&input.barcode)
        .bind(input.expiry_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)))?;

        timer.observe_duration();

        info!(product_id = %product.product_id, name = %product.name, "Product created");

        Ok(product)
    }

    /// Get a product by ID.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id))]
    pub async fn get_product(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE tenant_id = $1 AND product_id = $2",
            PRODUCT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// List products for a tenant, optionally filtered by search term or category.
    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    pub async fn list_products(
        &self,
        tenant_id: Uuid,
        filter: &ListProductsFilter,
    ) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));

        let products = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Product>(&format!(
                r#"
                SELECT {}
                FROM products
                WHERE tenant_id = $1
                  AND ($2::varchar IS NULL OR name ILIKE $2 OR barcode ILIKE $2)
                  AND ($3::varchar IS NULL OR category = $3)
                  AND product_id > $4
                ORDER BY product_id
                LIMIT $5
                "#,
                PRODUCT_COLUMNS
            ))
            .bind(tenant_id)
            .bind(&search)
            .bind(&filter.category)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Product>(&format!(
                r#"
                SELECT {}
                FROM products
                WHERE tenant_id = $1
                  AND ($2::varchar IS NULL OR name ILIKE $2 OR barcode ILIKE $2)
                  AND ($3::varchar IS NULL OR category = $3)
                ORDER BY product_id
                LIMIT $4
                "#,
                PRODUCT_COLUMNS
            ))
            .bind(tenant_id)
            .bind(&search)
            .bind(&filter.category)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    /// Update a product.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, product_id = %product_id))]
    pub async fn update_product(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
        input: &UpdateProduct,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($3, name),
                category = COALESCE($4, category),
                brand = COALESCE($5, brand),
                cost_price = COALESCE($6, cost_price),
                selling_price = COALESCE($7, selling_price),
                stock_quantity = COALESCE($8, stock_quantity),
                barcode = COALESCE($9, barcode),
                expiry_date = COALESCE($10, expiry_date)
            WHERE tenant_id = $1 AND product_id = $2
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(product_id)
        .bind(&input.name)
        .bind(&input.category)
        .bind(&input.brand)
        .bind(input.cost_price)
        .bind(input.selling_price)
        .bind(input.stock_quantity)
        .bind(&input.barcode)
        .bind(input.expiry_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// Delete a product.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id))]
    pub async fn delete_product(&self, tenant_id: Uuid, product_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_product"])
            .start_timer();

        let result = sqlx::query("DELETE FROM products WHERE tenant_id = $1 AND product_id = $2")
            .bind(tenant_id)
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete product: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(product_id = %product_id, "Product deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Customer Operations
    // -------------------------------------------------------------------------

    /// Create a new customer.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id))]
    pub async fn create_customer(&self, input: &CreateCustomer) -> Result<Customer, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_customer"])
            .start_timer();

        let customer_id = Uuid::new_v4();
        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers (customer_id, tenant_id, shop_name, owner_name, phone, address,
                latitude, longitude, outstanding_balance)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0)
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(customer_id)
        .bind(input.tenant_id)
        .bind(&input.shop_name)
        .bind(&input.owner_name)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(input.latitude)
        .bind(input.longitude)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create customer: {}", e))
        })?;

        timer.observe_duration();

        info!(customer_id = %customer.customer_id, shop_name = %customer.shop_name, "Customer created");

        Ok(customer)
    }

    /// Get a customer by ID.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    pub async fn get_customer(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE tenant_id = $1 AND customer_id = $2",
            CUSTOMER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get customer: {}", e)))?;

        timer.observe_duration();

        Ok(customer)
    }

    /// List customers for a tenant.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_customers(
        &self,
        tenant_id: Uuid,
        search: Option<&str>,
        page_size: i32,
        page_token: Option<Uuid>,
    ) -> Result<Vec<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customers"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;
        let search = search.map(|s| format!("%{}%", s));

        let customers = if let Some(cursor) = page_token {
            sqlx::query_as::<_, Customer>(&format!(
                r#"
                SELECT {}
                FROM customers
                WHERE tenant_id = $1
                  AND ($2::varchar IS NULL OR shop_name ILIKE $2 OR owner_name ILIKE $2)
                  AND customer_id > $3
                ORDER BY customer_id
                LIMIT $4
                "#,
                CUSTOMER_COLUMNS
            ))
            .bind(tenant_id)
            .bind(&search)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Customer>(&format!(
                r#"
                SELECT {}
                FROM customers
                WHERE tenant_id = $1
                  AND ($2::varchar IS NULL OR shop_name ILIKE $2 OR owner_name ILIKE $2)
                ORDER BY customer_id
                LIMIT $3
                "#,
                CUSTOMER_COLUMNS
            ))
            .bind(tenant_id)
            .bind(&search)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list customers: {}", e)))?;

        timer.observe_duration();

        Ok(customers)
    }

    /// Update a customer.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    pub async fn update_customer(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        input: &UpdateCustomer,
    ) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET shop_name = COALESCE($3, shop_name),
                owner_name = COALESCE($4, owner_name),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address),
                latitude = COALESCE($7, latitude),
                longitude = COALESCE($8, longitude)
            WHERE tenant_id = $1 AND customer_id = $2
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(customer_id)
        .bind(&input.shop_name)
        .bind(&input.owner_name)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(input.latitude)
        .bind(input.longitude)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update customer: {}", e))
        })?;

        timer.observe_duration();

        Ok(customer)
    }

    /// Delete a customer. Fails with a conflict if invoices reference it.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    pub async fn delete_customer(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_customer"])
            .start_timer();

        let result = sqlx::query("DELETE FROM customers WHERE tenant_id = $1 AND customer_id = $2")
            .bind(tenant_id)
            .bind(customer_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Customer has invoices and cannot be deleted"
                    ))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete customer: {}", e)),
            })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice together with its line items in one transaction.
    ///
    /// Totals are computed server-side by the reconciler; the invoice starts
    /// with `paid_amount = 0` and status `unpaid`.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, customer_id = %input.customer_id))]
    pub async fn create_invoice(
        &self,
        input: &CreateInvoice,
    ) -> Result<(Invoice, Vec<InvoiceItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let totals =
            reconciler::compute_totals(&input.items, input.discount_amount, input.tax_rate_percent);

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_id = Uuid::new_v4();
        let invoice_number = generate_invoice_number(Utc::now());

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (invoice_id, tenant_id, customer_id, invoice_number, invoice_date,
                due_date, subtotal, discount_amount, tax_amount, total_amount, paid_amount,
                payment_status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, 'unpaid', $11)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(input.tenant_id)
        .bind(input.customer_id)
        .bind(&invoice_number)
        .bind(input.invoice_date)
        .bind(input.due_date)
        .bind(totals.subtotal)
        .bind(input.discount_amount)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest(anyhow::anyhow!("Customer not found"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let item = sqlx::query_as::<_, InvoiceItem>(
                r#"
                INSERT INTO invoice_items (line_item_id, invoice_id, tenant_id, product_id,
                    quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING line_item_id, invoice_id, tenant_id, product_id, quantity, unit_price, line_total
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(input.tenant_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.quantity * line.unit_price)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::BadRequest(anyhow::anyhow!("Product not found"))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e)),
            })?;
            items.push(item);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );

        Ok((invoice, items))
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE tenant_id = $1 AND invoice_id = $2",
            INVOICE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get line items for an invoice.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn get_invoice_items(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_items"])
            .start_timer();

        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT line_item_id, invoice_id, tenant_id, product_id, quantity, unit_price, line_total
            FROM invoice_items
            WHERE tenant_id = $1 AND invoice_id = $2
            ORDER BY line_item_id
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice items: {}", e))
        })?;

        timer.observe_duration();

        Ok(items)
    }

    /// List invoices for a tenant.
    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    pub async fn list_invoices(
        &self,
        tenant_id: Uuid,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.payment_status.map(|s| s.as_str().to_string());

        let invoices = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                SELECT {}
                FROM invoices
                WHERE tenant_id = $1
                  AND ($2::varchar IS NULL OR payment_status = $2)
                  AND ($3::uuid IS NULL OR customer_id = $3)
                  AND ($4::date IS NULL OR invoice_date >= $4)
                  AND ($5::date IS NULL OR invoice_date <= $5)
                  AND invoice_id > $6
                ORDER BY invoice_id
                LIMIT $7
                "#,
                INVOICE_COLUMNS
            ))
            .bind(tenant_id)
            .bind(&status_str)
            .bind(filter.customer_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                SELECT {}
                FROM invoices
                WHERE tenant_id = $1
                  AND ($2::varchar IS NULL OR payment_status = $2)
                  AND ($3::uuid IS NULL OR customer_id = $3)
                  AND ($4::date IS NULL OR invoice_date >= $4)
                  AND ($5::date IS NULL OR invoice_date <= $5)
                ORDER BY invoice_id
                LIMIT $6
                "#,
                INVOICE_COLUMNS
            ))
            .bind(tenant_id)
            .bind(&status_str)
            .bind(filter.customer_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// List invoices past their due date and not fully paid.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_overdue_invoices(
        &self,
        tenant_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_overdue_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE tenant_id = $1
              AND due_date < $2
              AND payment_status != 'paid'
            ORDER BY due_date, invoice_number
            "#,
            INVOICE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list overdue invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Manually override an invoice's payment status.
    ///
    /// No recomputation of `paid_amount`; the override may contradict the
    /// recorded payments, which is the documented escape hatch.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn set_payment_status(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_payment_status"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET payment_status = $3
            WHERE tenant_id = $1 AND invoice_id = $2
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to set payment status: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(
                invoice_id = %inv.invoice_id,
                payment_status = %inv.payment_status,
                "Payment status overridden"
            );
        }

        Ok(invoice)
    }

    /// Delete an invoice. Line items and payments cascade.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, tenant_id: Uuid, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query("DELETE FROM invoices WHERE tenant_id = $1 AND invoice_id = $2")
            .bind(tenant_id)
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Invoice deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Record a payment and reconcile the invoice in one transaction.
    ///
    /// The invoice row is locked for the duration, the amount validated
    /// against the remaining balance, then the payment insert and the
    /// `paid_amount`/`payment_status` update commit together.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, invoice_id = %input.invoice_id))]
    pub async fn record_payment(
        &self,
        input: &CreatePayment,
    ) -> Result<(Payment, Invoice), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE tenant_id = $1 AND invoice_id = $2 FOR UPDATE",
            INVOICE_COLUMNS
        ))
        .bind(input.tenant_id)
        .bind(input.invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load invoice: {}", e)))?
        .ok_or_else(|| {
            ERRORS_TOTAL.with_label_values(&["not_found"]).inc();
            AppError::NotFound(anyhow::anyhow!("Invoice not found"))
        })?;

        reconciler::validate_payment_amount(
            input.amount,
            invoice.total_amount,
            invoice.paid_amount,
        )
        .map_err(|msg| {
            ERRORS_TOTAL.with_label_values(&["validation_error"]).inc();
            AppError::BadRequest(anyhow::anyhow!(msg))
        })?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (payment_id, tenant_id, invoice_id, payment_date, amount,
                payment_method, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.tenant_id)
        .bind(input.invoice_id)
        .bind(input.payment_date)
        .bind(input.amount)
        .bind(&input.payment_method)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        let reconciled =
            reconciler::apply_payment(invoice.total_amount, invoice.paid_amount, input.amount);

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET paid_amount = $3, payment_status = $4
            WHERE tenant_id = $1 AND invoice_id = $2
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(input.tenant_id)
        .bind(input.invoice_id)
        .bind(reconciled.paid_amount)
        .bind(reconciled.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to reconcile invoice: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit payment: {}", e))
        })?;

        timer.observe_duration();

        info!(
            payment_id = %payment.payment_id,
            invoice_id = %invoice.invoice_id,
            amount = %payment.amount,
            payment_status = %invoice.payment_status,
            "Payment recorded"
        );

        Ok((payment, invoice))
    }

    /// Delete a payment and recompute the invoice balance in one transaction.
    ///
    /// `paid_amount` is re-summed from the remaining payment rows rather than
    /// decremented, so stored drift is corrected on the way.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, payment_id = %payment_id))]
    pub async fn delete_payment(
        &self,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_id: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM payments WHERE tenant_id = $1 AND payment_id = $2 RETURNING invoice_id",
        )
        .bind(tenant_id)
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment: {}", e)))?;

        let Some(invoice_id) = invoice_id else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE tenant_id = $1 AND invoice_id = $2 FOR UPDATE",
            INVOICE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load invoice: {}", e)))?;

        let remaining: Vec<Decimal> = sqlx::query_scalar(
            "SELECT amount FROM payments WHERE tenant_id = $1 AND invoice_id = $2",
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load remaining payments: {}", e))
        })?;

        let reconciled = reconciler::reverse_deleted_payment(invoice.total_amount, &remaining);

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET paid_amount = $3, payment_status = $4
            WHERE tenant_id = $1 AND invoice_id = $2
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(reconciled.paid_amount)
        .bind(reconciled.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to reconcile invoice: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit payment deletion: {}", e))
        })?;

        timer.observe_duration();

        info!(
            payment_id = %payment_id,
            invoice_id = %invoice.invoice_id,
            paid_amount = %invoice.paid_amount,
            payment_status = %invoice.payment_status,
            "Payment deleted and invoice reconciled"
        );

        Ok(Some(invoice))
    }

    /// List payments for a tenant.
    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    pub async fn list_payments(
        &self,
        tenant_id: Uuid,
        filter: &ListPaymentsFilter,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let payments = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Payment>(&format!(
                r#"
                SELECT {}
                FROM payments
                WHERE tenant_id = $1
                  AND ($2::uuid IS NULL OR invoice_id = $2)
                  AND ($3::date IS NULL OR payment_date >= $3)
                  AND ($4::date IS NULL OR payment_date <= $4)
                  AND payment_id > $5
                ORDER BY payment_id
                LIMIT $6
                "#,
                PAYMENT_COLUMNS
            ))
            .bind(tenant_id)
            .bind(filter.invoice_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Payment>(&format!(
                r#"
                SELECT {}
                FROM payments
                WHERE tenant_id = $1
                  AND ($2::uuid IS NULL OR invoice_id = $2)
                  AND ($3::date IS NULL OR payment_date >= $3)
                  AND ($4::date IS NULL OR payment_date <= $4)
                ORDER BY payment_id
                LIMIT $5
                "#,
                PAYMENT_COLUMNS
            ))
            .bind(tenant_id)
            .bind(filter.invoice_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    // -------------------------------------------------------------------------
    // Settings Operations
    // -------------------------------------------------------------------------

    /// Get business settings for a tenant.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn get_business_settings(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<BusinessSettings>, AppError> {
        let settings = sqlx::query_as::<_, BusinessSettings>(
            r#"
            SELECT tenant_id, business_name, currency, default_tax_rate, address, phone, updated_utc
            FROM business_settings
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get business settings: {}", e))
        })?;

        Ok(settings)
    }

    /// Upsert business settings for a tenant.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id))]
    pub async fn upsert_business_settings(
        &self,
        tenant_id: Uuid,
        input: &UpsertBusinessSettings,
    ) -> Result<BusinessSettings, AppError> {
        let settings = sqlx::query_as::<_, BusinessSettings>(
            r#"
            INSERT INTO business_settings (tenant_id, business_name, currency, default_tax_rate, address, phone, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (tenant_id) DO UPDATE
            SET business_name = EXCLUDED.business_name,
                currency = EXCLUDED.currency,
                default_tax_rate = EXCLUDED.default_tax_rate,
                address = EXCLUDED.address,
                phone = EXCLUDED.phone,
                updated_utc = NOW()
            RETURNING tenant_id, business_name, currency, default_tax_rate, address, phone, updated_utc
            "#,
        )
        .bind(tenant_id)
        .bind(&input.business_name)
        .bind(&input.currency)
        .bind(input.default_tax_rate)
        .bind(&input.address)
        .bind(&input.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to upsert business settings: {}", e))
        })?;

        info!("Business settings updated");

        Ok(settings)
    }

    /// Get the profile for a tenant.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn get_profile(&self, tenant_id: Uuid) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT tenant_id, full_name, email, phone, updated_utc FROM profiles WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get profile: {}", e)))?;

        Ok(profile)
    }

    /// Upsert the profile for a tenant.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id))]
    pub async fn upsert_profile(
        &self,
        tenant_id: Uuid,
        input: &UpsertProfile,
    ) -> Result<Profile, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (tenant_id, full_name, email, phone, updated_utc)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (tenant_id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                updated_utc = NOW()
            RETURNING tenant_id, full_name, email, phone, updated_utc
            "#,
        )
        .bind(tenant_id)
        .bind(&input.full_name)
        .bind(&input.email)
        .bind(&input.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to upsert profile: {}", e)))?;

        info!("Profile updated");

        Ok(profile)
    }

    // -------------------------------------------------------------------------
    // Analytics Operations
    // -------------------------------------------------------------------------

    /// Headline dashboard figures.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn analytics_summary(
        &self,
        tenant_id: Uuid,
        low_stock_threshold: i32,
    ) -> Result<AnalyticsSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["analytics_summary"])
            .start_timer();

        let (total_revenue, total_collected, invoice_count): (Decimal, Decimal, i64) =
            sqlx::query_as(
                r#"
                SELECT COALESCE(SUM(total_amount), 0), COALESCE(SUM(paid_amount), 0), COUNT(*)
                FROM invoices
                WHERE tenant_id = $1
                "#,
            )
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to aggregate invoices: {}", e))
            })?;

        let customer_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to count customers: {}", e))
                })?;

        let (product_count, low_stock_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE stock_quantity <= $2)
            FROM products
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(low_stock_threshold)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count products: {}", e)))?;

        timer.observe_duration();

        Ok(AnalyticsSummary {
            total_revenue,
            total_collected,
            total_outstanding: total_revenue - total_collected,
            invoice_count,
            customer_count,
            product_count,
            low_stock_count,
        })
    }

    /// Monthly revenue for the trailing `months` months, newest last.
    ///
    /// Profit is estimated at a fixed 60% cost ratio.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn revenue_by_month(
        &self,
        tenant_id: Uuid,
        months: i32,
    ) -> Result<Vec<MonthlyRevenue>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["revenue_by_month"])
            .start_timer();

        let rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(
            r#"
            SELECT DATE_TRUNC('month', invoice_date)::date AS month, SUM(total_amount) AS revenue
            FROM invoices
            WHERE tenant_id = $1
              AND invoice_date >= (CURRENT_DATE - make_interval(months => $2))::date
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(tenant_id)
        .bind(months)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to aggregate monthly revenue: {}", e))
        })?;

        timer.observe_duration();

        // Estimated profit assumes a fixed 60% cost ratio.
        let cost_ratio = Decimal::new(6, 1);
        Ok(rows
            .into_iter()
            .map(|(month, revenue)| MonthlyRevenue {
                month,
                revenue,
                estimated_profit: revenue - revenue * cost_ratio,
            })
            .collect())
    }

    /// Products ranked by quantity sold.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn top_products(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TopProduct>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["top_products"])
            .start_timer();

        let products = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT p.product_id, p.name,
                   COALESCE(SUM(i.quantity), 0) AS quantity_sold,
                   COALESCE(SUM(i.line_total), 0) AS revenue
            FROM products p
            JOIN invoice_items i ON i.product_id = p.product_id AND i.tenant_id = p.tenant_id
            WHERE p.tenant_id = $1
            GROUP BY p.product_id, p.name
            ORDER BY quantity_sold DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to rank products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    /// Customers ranked by invoiced total.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn top_customers(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TopCustomer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["top_customers"])
            .start_timer();

        let customers = sqlx::query_as::<_, TopCustomer>(
            r#"
            SELECT c.customer_id, c.shop_name,
                   COALESCE(SUM(i.total_amount), 0) AS invoiced_total,
                   COUNT(i.invoice_id) AS invoice_count
            FROM customers c
            JOIN invoices i ON i.customer_id = c.customer_id AND i.tenant_id = c.tenant_id
            WHERE c.tenant_id = $1
            GROUP BY c.customer_id, c.shop_name
            ORDER BY invoiced_total DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to rank customers: {}", e)))?;

        timer.observe_duration();

        Ok(customers)
    }
}
