use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreatePatternParams, PatternListScope, PatternsRepo, PatternsWriteRepo, RepoError,
        UpdatePatternParams,
    },
    domain::{
        entities::{ContentPaths, PatternRecord},
        locale::{Locale, LocalizedText},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const PATTERN_COLUMNS: &str = "id, category_id, slug, name, description, content_paths, \
     published, sort_order, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PatternRow {
    id: Uuid,
    category_id: Uuid,
    slug: String,
    name: Json<LocalizedText>,
    description: Json<LocalizedText>,
    content_paths: Json<ContentPaths>,
    published: bool,
    sort_order: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PatternRow> for PatternRecord {
    fn from(row: PatternRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            slug: row.slug,
            name: row.name.0,
            description: row.description.0,
            content_paths: row.content_paths.0,
            published: row.published,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn scope_condition(scope: PatternListScope) -> &'static str {
    match scope {
        PatternListScope::Public => " AND published",
        PatternListScope::Admin => "",
    }
}

#[async_trait]
impl PatternsRepo for PostgresRepositories {
    async fn list_patterns(
        &self,
        scope: PatternListScope,
    ) -> Result<Vec<PatternRecord>, RepoError> {
        let sql = format!(
            "SELECT {PATTERN_COLUMNS} FROM design_patterns WHERE TRUE{} \
             ORDER BY sort_order ASC, slug ASC",
            scope_condition(scope)
        );
        let rows = sqlx::query_as::<_, PatternRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PatternRecord::from).collect())
    }

    async fn list_patterns_in_category(
        &self,
        category_id: Uuid,
        scope: PatternListScope,
    ) -> Result<Vec<PatternRecord>, RepoError> {
        let sql = format!(
            "SELECT {PATTERN_COLUMNS} FROM design_patterns WHERE category_id = $1{} \
             ORDER BY sort_order ASC, slug ASC",
            scope_condition(scope)
        );
        let rows = sqlx::query_as::<_, PatternRow>(&sql)
            .bind(category_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PatternRecord::from).collect())
    }

    async fn find_pattern_by_id(&self, id: Uuid) -> Result<Option<PatternRecord>, RepoError> {
        let sql = format!("SELECT {PATTERN_COLUMNS} FROM design_patterns WHERE id = $1");
        let row = sqlx::query_as::<_, PatternRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PatternRecord::from))
    }

    async fn find_pattern_by_slug(&self, slug: &str) -> Result<Option<PatternRecord>, RepoError> {
        let sql = format!("SELECT {PATTERN_COLUMNS} FROM design_patterns WHERE slug = $1");
        let row = sqlx::query_as::<_, PatternRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PatternRecord::from))
    }
}

#[async_trait]
impl PatternsWriteRepo for PostgresRepositories {
    async fn create_pattern(
        &self,
        params: CreatePatternParams,
    ) -> Result<PatternRecord, RepoError> {
        let sql = format!(
            "INSERT INTO design_patterns \
                 (id, category_id, slug, name, description, content_paths, published, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {PATTERN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PatternRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.category_id)
            .bind(&params.slug)
            .bind(Json(&params.name))
            .bind(Json(&params.description))
            .bind(Json(&params.content_paths))
            .bind(params.published)
            .bind(params.sort_order)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_pattern(
        &self,
        params: UpdatePatternParams,
    ) -> Result<PatternRecord, RepoError> {
        let sql = format!(
            "UPDATE design_patterns \
             SET category_id = $2, slug = $3, name = $4, description = $5, \
                 published = $6, sort_order = $7, updated_at = now() \
             WHERE id = $1 \
             RETURNING {PATTERN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PatternRow>(&sql)
            .bind(params.id)
            .bind(params.category_id)
            .bind(&params.slug)
            .bind(Json(&params.name))
            .bind(Json(&params.description))
            .bind(params.published)
            .bind(params.sort_order)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn set_content_path(
        &self,
        id: Uuid,
        locale: Locale,
        path: &str,
    ) -> Result<PatternRecord, RepoError> {
        let sql = format!(
            "UPDATE design_patterns \
             SET content_paths = content_paths || jsonb_build_object($2::text, $3::text), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {PATTERN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PatternRow>(&sql)
            .bind(id)
            .bind(locale.as_str())
            .bind(path)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_pattern(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM design_patterns WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
