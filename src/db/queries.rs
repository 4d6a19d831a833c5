use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::{JobStore, JobStoreError};
use crate::models::job::{new_record_id, JobStatus, NewProductJob, ProductJob, ProductJobPatch};

const COLUMNS: &str = "id, serial_number, product_name, input_image_urls, output_image_urls, \
                       status, request_id, created_at, updated_at";

/// Postgres-backed job store.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_job(row: &PgRow) -> Result<ProductJob, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(ProductJob {
        id: row.try_get("id")?,
        serial_number: row.try_get("serial_number")?,
        product_name: row.try_get("product_name")?,
        input_image_urls: row.try_get("input_image_urls")?,
        output_image_urls: row.try_get("output_image_urls")?,
        status: JobStatus::from(status),
        request_id: row.try_get("request_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert_batch(
        &self,
        jobs: Vec<NewProductJob>,
    ) -> Result<Vec<ProductJob>, JobStoreError> {
        let sql = format!(
            r#"
            INSERT INTO product_jobs
                (id, serial_number, product_name, input_image_urls, output_image_urls, status, request_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#
        );

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(jobs.len());
        for job in jobs {
            let row = sqlx::query(&sql)
                .bind(new_record_id())
                .bind(job.serial_number)
                .bind(&job.product_name)
                .bind(&job.input_image_urls)
                .bind(&job.output_image_urls)
                .bind(job.status.to_string())
                .bind(&job.request_id)
                .fetch_one(&mut *tx)
                .await?;
            created.push(row_to_job(&row)?);
        }
        tx.commit().await?;

        Ok(created)
    }

    async fn get(&self, id: &str) -> Result<Option<ProductJob>, JobStoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM product_jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_job).transpose()?)
    }

    async fn list(&self) -> Result<Vec<ProductJob>, JobStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM product_jobs ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_job).collect::<Result<_, _>>()?)
    }

    async fn list_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Vec<ProductJob>, JobStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM product_jobs WHERE request_id = $1 ORDER BY serial_number ASC"
        ))
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_job).collect::<Result<_, _>>()?)
    }

    async fn record_outcome(
        &self,
        id: &str,
        output_image_urls: &[String],
        status: &JobStatus,
    ) -> Result<(), JobStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE product_jobs
            SET output_image_urls = $1,
                status = $2,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(output_image_urls)
        .bind(status.to_string())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn update(
        &self,
        id: &str,
        patch: ProductJobPatch,
    ) -> Result<Option<ProductJob>, JobStoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE product_jobs
            SET serial_number = COALESCE($1, serial_number),
                product_name = COALESCE($2, product_name),
                input_image_urls = COALESCE($3, input_image_urls),
                output_image_urls = COALESCE($4, output_image_urls),
                status = COALESCE($5, status),
                request_id = COALESCE($6, request_id),
                updated_at = NOW()
            WHERE id = $7
            RETURNING {COLUMNS}
            "#
        ))
        .bind(patch.serial_number)
        .bind(patch.product_name)
        .bind(patch.input_image_urls)
        .bind(patch.output_image_urls)
        .bind(patch.status.map(String::from))
        .bind(patch.request_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_job).transpose()?)
    }

    async fn delete(&self, id: &str) -> Result<Option<ProductJob>, JobStoreError> {
        let row = sqlx::query(&format!(
            "DELETE FROM product_jobs WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_job).transpose()?)
    }

    async fn set_status_for_request(
        &self,
        request_id: &str,
        status: &JobStatus,
    ) -> Result<u64, JobStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE product_jobs
            SET status = $1,
                updated_at = NOW()
            WHERE request_id = $2
            "#,
        )
        .bind(status.to_string())
        .bind(request_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), JobStoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
