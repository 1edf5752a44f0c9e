use anyhow::Result;

use super::schema::Database;
use super::types::Page;

impl Database {
    // ========================================================================
    // Page Operations
    // ========================================================================

    pub async fn upsert_page(&self, page: &Page) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pages (inputPath, outputPath, updated)
            VALUES (?, ?, ?)
            ON CONFLICT(inputPath) DO UPDATE SET
                outputPath = excluded.outputPath,
                updated = excluded.updated
            "#,
        )
        .bind(&page.input_path)
        .bind(&page.output_path)
        .bind(&page.updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove pages whose input or output path equals `path`.
    pub async fn delete_page(&self, path: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM pages WHERE inputPath = ? OR outputPath = ?")
            .bind(path)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// All pages, most recently updated first.
    pub async fn pages(&self) -> Result<Vec<Page>> {
        let pages = sqlx::query_as::<_, Page>(
            "SELECT inputPath, outputPath, updated FROM pages ORDER BY updated DESC, inputPath",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(pages)
    }
}
