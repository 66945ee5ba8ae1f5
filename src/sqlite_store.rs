//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the `posts` / `insights` schema
//! created by [`crate::migrate`]. Unscoped posts store `''` in the scope
//! columns; this module converts between that encoding and `Option`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use signal_harvest_core::models::{ContentItem, Insight, Scope, Sector, Tone};
use signal_harvest_core::store::{Store, StoreCounts};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Scope predicate over a `posts` row aliased `p`. Binds, in order:
/// user, user, user, query, query.
const SCOPE_CLAUSE: &str = r#"
    ((? = '' AND p.scope_user_id = '' AND p.scope_query = '')
     OR (? <> '' AND p.scope_user_id = ? AND (? = '' OR p.scope_query = ?)))
"#;

fn scope_binds(scope: &Scope) -> (String, String) {
    (
        scope.user_id().unwrap_or_default().to_string(),
        scope.query().unwrap_or_default().to_string(),
    )
}

fn ts_to_datetime(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| anyhow!("timestamp out of range: {}", ts))
}

fn empty_to_none(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn post_from_row(row: &SqliteRow) -> Result<ContentItem> {
    Ok(ContentItem {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        channel: row.try_get("channel")?,
        source: row.try_get("source")?,
        created_at: ts_to_datetime(row.try_get("created_at")?)?,
        score: row.try_get("score")?,
        scope_query: empty_to_none(row.try_get("scope_query")?),
        scope_user_id: empty_to_none(row.try_get("scope_user_id")?),
    })
}

fn insight_from_row(row: &SqliteRow) -> Result<Insight> {
    let sector: String = row.try_get("sector")?;
    let tone: String = row.try_get("tone")?;
    let urgency: i64 = row.try_get("urgency_score")?;
    let novelty: i64 = row.try_get("novelty_score")?;
    let interesting: i64 = row.try_get("interesting_score")?;

    Ok(Insight {
        id: row.try_get("id")?,
        post_ref: row.try_get("post_ref")?,
        signal: row.try_get("signal")?,
        why_it_matters: row.try_get("why_it_matters")?,
        action_angle: row.try_get("action_angle")?,
        sector: sector.parse::<Sector>().map_err(|e| anyhow!(e))?,
        tone: tone.parse::<Tone>().map_err(|e| anyhow!(e))?,
        urgency_score: u8::try_from(urgency)?,
        novelty_score: u8::try_from(novelty)?,
        interesting_score: u8::try_from(interesting)?,
        created_at: ts_to_datetime(row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_post(&self, post: &ContentItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (id, url, title, content, channel, source, created_at,
                               score, scope_query, scope_user_id, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&post.id)
        .bind(&post.url)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.channel)
        .bind(&post.source)
        .bind(post.created_at.timestamp())
        .bind(post.score)
        .bind(post.scope_query.as_deref().unwrap_or_default())
        .bind(post.scope_user_id.as_deref().unwrap_or_default())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn post_exists(&self, url: &str, scope_query: Option<&str>) -> Result<bool> {
        let exists: bool = match scope_query.filter(|q| !q.is_empty()) {
            Some(query) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) > 0 FROM posts WHERE url = ? AND scope_query = ?",
                )
                .bind(url)
                .bind(query)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) > 0 FROM posts WHERE url = ?")
                    .bind(url)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(exists)
    }

    async fn pending_posts(&self, scope: &Scope, limit: usize) -> Result<Vec<ContentItem>> {
        let (user, query) = scope_binds(scope);
        let sql = format!(
            r#"
            SELECT p.id, p.url, p.title, p.content, p.channel, p.source, p.created_at,
                   p.score, p.scope_query, p.scope_user_id
            FROM posts p
            WHERE {}
              AND NOT EXISTS (SELECT 1 FROM insights i WHERE i.post_ref = p.url)
            ORDER BY p.rowid ASC
            LIMIT ?
            "#,
            SCOPE_CLAUSE
        );

        let rows = sqlx::query(&sql)
            .bind(&user)
            .bind(&user)
            .bind(&user)
            .bind(&query)
            .bind(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(post_from_row).collect()
    }

    async fn insight_exists(&self, post_ref: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM insights WHERE post_ref = ?")
            .bind(post_ref)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert_insight(&self, insight: &Insight) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO insights (id, post_ref, signal, why_it_matters, action_angle, sector,
                                  tone, urgency_score, novelty_score, interesting_score,
                                  created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&insight.id)
        .bind(&insight.post_ref)
        .bind(&insight.signal)
        .bind(&insight.why_it_matters)
        .bind(&insight.action_angle)
        .bind(insight.sector.as_str())
        .bind(insight.tone.as_str())
        .bind(insight.urgency_score as i64)
        .bind(insight.novelty_score as i64)
        .bind(insight.interesting_score as i64)
        .bind(insight.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_posts_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM posts WHERE created_at < ?")
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_insights_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM insights WHERE created_at < ?")
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_orphaned_insights(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM insights WHERE NOT EXISTS (SELECT 1 FROM posts p WHERE p.url = insights.post_ref)",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn recent_insights(&self, scope: &Scope, limit: usize) -> Result<Vec<Insight>> {
        let (user, query) = scope_binds(scope);
        let sql = format!(
            r#"
            SELECT i.id, i.post_ref, i.signal, i.why_it_matters, i.action_angle, i.sector,
                   i.tone, i.urgency_score, i.novelty_score, i.interesting_score, i.created_at
            FROM insights i
            WHERE EXISTS (SELECT 1 FROM posts p WHERE p.url = i.post_ref AND {})
            ORDER BY i.created_at DESC, i.rowid DESC
            LIMIT ?
            "#,
            SCOPE_CLAUSE
        );

        let rows = sqlx::query(&sql)
            .bind(&user)
            .bind(&user)
            .bind(&user)
            .bind(&query)
            .bind(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(insight_from_row).collect()
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        let insights: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insights")
            .fetch_one(&self.pool)
            .await?;
        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts p WHERE NOT EXISTS (SELECT 1 FROM insights i WHERE i.post_ref = p.url)",
        )
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT channel, COUNT(*) AS post_count
            FROM posts
            GROUP BY channel
            ORDER BY post_count DESC, channel ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut per_channel: Vec<(String, i64)> = Vec::with_capacity(rows.len());
        for row in &rows {
            per_channel.push((row.try_get("channel")?, row.try_get("post_count")?));
        }

        Ok(StoreCounts {
            posts,
            insights,
            pending,
            per_channel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use signal_harvest_core::models::InsightDraft;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::apply(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn post(url: &str, scope: &Scope, created_at: DateTime<Utc>) -> ContentItem {
        ContentItem {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            title: "Title".to_string(),
            content: "Body".to_string(),
            channel: "SaaS".to_string(),
            source: scope.source_tag().to_string(),
            created_at,
            score: 3,
            scope_query: scope.query.clone(),
            scope_user_id: scope.user_id.clone(),
        }
    }

    fn insight(post_ref: &str, created_at: DateTime<Utc>) -> Insight {
        Insight::from_draft(
            InsightDraft {
                signal: "signal".to_string(),
                why_it_matters: "why".to_string(),
                action_angle: "act".to_string(),
                sector: Sector::CreatorTools,
                tone: Tone::Hopeful,
                urgency_score: 7,
                novelty_score: 4,
                interesting_score: 55,
            },
            post_ref,
            created_at,
        )
    }

    #[tokio::test]
    async fn test_insert_post_round_trip_and_conflict() {
        let store = memory_store().await;
        let scope = Scope::custom("focus", "u1");
        let p = post("https://reddit.com/r/ADHD/1", &scope, Utc::now());

        assert!(store.insert_post(&p).await.unwrap());
        let mut dup = p.clone();
        dup.id = "other".to_string();
        assert!(!store.insert_post(&dup).await.unwrap());

        let pending = store.pending_posts(&Scope::for_user("u1"), 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scope_query.as_deref(), Some("focus"));
        assert_eq!(pending[0].created_at.timestamp(), p.created_at.timestamp());
    }

    #[tokio::test]
    async fn test_background_posts_conflict_on_url() {
        let store = memory_store().await;
        let bg = Scope::background();
        assert!(store.insert_post(&post("https://x/1", &bg, Utc::now())).await.unwrap());
        assert!(!store.insert_post(&post("https://x/1", &bg, Utc::now())).await.unwrap());
        assert!(store.post_exists("https://x/1", None).await.unwrap());
        assert!(!store.post_exists("https://x/1", Some("A")).await.unwrap());
    }

    #[tokio::test]
    async fn test_scope_filtering() {
        let store = memory_store().await;
        let now = Utc::now();
        store
            .insert_post(&post("https://x/bg", &Scope::background(), now))
            .await
            .unwrap();
        store
            .insert_post(&post("https://x/a", &Scope::custom("A", "u1"), now))
            .await
            .unwrap();
        store
            .insert_post(&post("https://x/b", &Scope::custom("B", "u1"), now))
            .await
            .unwrap();
        store
            .insert_post(&post("https://x/c", &Scope::custom("A", "u2"), now))
            .await
            .unwrap();

        let bg = store.pending_posts(&Scope::background(), 10).await.unwrap();
        assert_eq!(bg.len(), 1);
        assert_eq!(bg[0].url, "https://x/bg");

        let u1 = store.pending_posts(&Scope::for_user("u1"), 10).await.unwrap();
        assert_eq!(u1.len(), 2);

        let u1a = store
            .pending_posts(&Scope::custom("A", "u1"), 10)
            .await
            .unwrap();
        assert_eq!(u1a.len(), 1);
        assert_eq!(u1a[0].url, "https://x/a");
    }

    #[tokio::test]
    async fn test_insight_round_trip_and_recent() {
        let store = memory_store().await;
        let now = Utc::now();
        let scope = Scope::custom("A", "u1");
        store.insert_post(&post("https://x/a", &scope, now)).await.unwrap();

        let i = insight("https://x/a", now);
        assert!(store.insert_insight(&i).await.unwrap());
        assert!(!store.insert_insight(&insight("https://x/a", now)).await.unwrap());
        assert!(store.insight_exists("https://x/a").await.unwrap());

        let recent = store.recent_insights(&Scope::for_user("u1"), 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].sector, Sector::CreatorTools);
        assert_eq!(recent[0].tone, Tone::Hopeful);
        assert_eq!(recent[0].interesting_score, 55);

        assert!(store
            .recent_insights(&Scope::background(), 10)
            .await
            .unwrap()
            .is_empty());
        assert!(store.pending_posts(&scope, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retention_and_orphans() {
        let store = memory_store().await;
        let now = Utc::now();
        let bg = Scope::background();
        store
            .insert_post(&post("https://x/old", &bg, now - Duration::days(4)))
            .await
            .unwrap();
        store
            .insert_post(&post("https://x/new", &bg, now - Duration::days(2)))
            .await
            .unwrap();
        store.insert_insight(&insight("https://x/old", now)).await.unwrap();
        store
            .insert_insight(&insight("https://x/gone", now - Duration::days(5)))
            .await
            .unwrap();

        let cutoff = now - Duration::days(3);
        assert_eq!(store.delete_posts_before(cutoff).await.unwrap(), 1);
        assert_eq!(store.delete_insights_before(cutoff).await.unwrap(), 1);
        assert_eq!(store.delete_orphaned_insights().await.unwrap(), 1);

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.posts, 1);
        assert_eq!(counts.insights, 0);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.per_channel, vec![("SaaS".to_string(), 1)]);
    }
}
