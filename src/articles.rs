use crate::db::now_rfc3339;
use crate::i18n::Msg;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ARTICLE_COLUMNS: &str = "id, title_en, title_ar, body_en, body_ar, category, is_published,
    author_id, created_at, updated_at, published_at";

const TITLE_MAX: usize = 200;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title_en: String,
    pub title_ar: String,
    pub body_en: String,
    pub body_ar: String,
    pub category: Option<String>,
    pub is_published: bool,
    pub author_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub published_at: Option<String>,
}

/// Create and update payload. On update, absent fields keep their value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleInput {
    pub title_en: Option<String>,
    pub title_ar: Option<String>,
    pub body_en: Option<String>,
    pub body_ar: Option<String>,
    pub category: Option<String>,
    pub is_published: Option<bool>,
}

fn row_to_article(row: &Row<'_>) -> rusqlite::Result<Article> {
    let published: i64 = row.get(6)?;
    Ok(Article {
        id: row.get(0)?,
        title_en: row.get(1)?,
        title_ar: row.get(2)?,
        body_en: row.get(3)?,
        body_ar: row.get(4)?,
        category: row.get(5)?,
        is_published: published != 0,
        author_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        published_at: row.get(10)?,
    })
}

fn clean(v: Option<&str>) -> String {
    v.map(str::trim).unwrap_or("").to_string()
}

fn check_titles(title_en: &str, title_ar: &str) -> Result<(), Msg> {
    if title_en.is_empty() && title_ar.is_empty() {
        return Err(Msg::TitleRequired);
    }
    if title_en.chars().count() > TITLE_MAX || title_ar.chars().count() > TITLE_MAX {
        return Err(Msg::TitleRequired);
    }
    Ok(())
}

pub fn find(conn: &Connection, id: &str) -> anyhow::Result<Option<Article>> {
    let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?");
    Ok(conn.query_row(&sql, [id], row_to_article).optional()?)
}

pub fn find_published(conn: &Connection, id: &str) -> anyhow::Result<Option<Article>> {
    Ok(find(conn, id)?.filter(|a| a.is_published))
}

/// Admin view: every article, newest first.
pub fn list_all(conn: &Connection) -> anyhow::Result<Vec<Article>> {
    let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY created_at DESC, rowid DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], row_to_article)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_published(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Article>> {
    let sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles
         WHERE is_published = 1
         ORDER BY published_at DESC, rowid DESC
         LIMIT ?"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([limit], row_to_article)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Builds an unsaved article from a create payload.
pub fn draft(input: &ArticleInput, author_id: Option<&str>) -> Result<Article, Msg> {
    let title_en = clean(input.title_en.as_deref());
    let title_ar = clean(input.title_ar.as_deref());
    check_titles(&title_en, &title_ar)?;
    let now = now_rfc3339();
    let is_published = input.is_published.unwrap_or(false);
    Ok(Article {
        id: Uuid::new_v4().to_string(),
        title_en,
        title_ar,
        body_en: input.body_en.clone().unwrap_or_default(),
        body_ar: input.body_ar.clone().unwrap_or_default(),
        category: input
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        is_published,
        author_id: author_id.map(str::to_string),
        created_at: now.clone(),
        updated_at: now.clone(),
        published_at: is_published.then_some(now),
    })
}

/// Applies the present fields. `published_at` is stamped the first time an
/// article becomes published and cleared when it is unpublished.
pub fn apply(existing: Article, input: &ArticleInput) -> Result<Article, Msg> {
    let mut a = existing;
    if let Some(t) = input.title_en.as_deref() {
        a.title_en = t.trim().to_string();
    }
    if let Some(t) = input.title_ar.as_deref() {
        a.title_ar = t.trim().to_string();
    }
    check_titles(&a.title_en, &a.title_ar)?;
    if let Some(b) = &input.body_en {
        a.body_en = b.clone();
    }
    if let Some(b) = &input.body_ar {
        a.body_ar = b.clone();
    }
    if let Some(c) = input.category.as_deref() {
        a.category = Some(c.trim().to_string()).filter(|c| !c.is_empty());
    }
    let now = now_rfc3339();
    if let Some(p) = input.is_published {
        if p && !a.is_published {
            a.published_at = Some(now.clone());
        } else if !p {
            a.published_at = None;
        }
        a.is_published = p;
    }
    a.updated_at = now;
    Ok(a)
}

pub fn insert(conn: &Connection, a: &Article) -> anyhow::Result<Article> {
    conn.execute(
        "INSERT INTO articles(
           id, title_en, title_ar, body_en, body_ar, category, is_published,
           author_id, created_at, updated_at, published_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &a.id,
            &a.title_en,
            &a.title_ar,
            &a.body_en,
            &a.body_ar,
            a.category.as_deref(),
            a.is_published as i64,
            a.author_id.as_deref(),
            &a.created_at,
            &a.updated_at,
            a.published_at.as_deref(),
        ),
    )?;
    find(conn, &a.id)?.ok_or_else(|| anyhow::anyhow!("inserted article {} not readable", a.id))
}

pub fn save(conn: &Connection, a: &Article) -> anyhow::Result<Article> {
    conn.execute(
        "UPDATE articles
         SET title_en = ?, title_ar = ?, body_en = ?, body_ar = ?, category = ?,
             is_published = ?, published_at = ?, updated_at = ?
         WHERE id = ?",
        (
            &a.title_en,
            &a.title_ar,
            &a.body_en,
            &a.body_ar,
            a.category.as_deref(),
            a.is_published as i64,
            a.published_at.as_deref(),
            &a.updated_at,
            &a.id,
        ),
    )?;
    find(conn, &a.id)?.ok_or_else(|| anyhow::anyhow!("article {} vanished", a.id))
}

pub fn delete(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    Ok(conn.execute("DELETE FROM articles WHERE id = ?", [id])? > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn input(title: &str, published: bool) -> ArticleInput {
        ArticleInput {
            title_en: Some(title.into()),
            title_ar: Some("عنوان".into()),
            body_en: Some("Body".into()),
            body_ar: Some("نص".into()),
            category: None,
            is_published: Some(published),
        }
    }

    #[test]
    fn drafts_are_hidden_from_published_queries() {
        let conn = open_in_memory().expect("db");
        let hidden = insert(&conn, &draft(&input("Draft", false), None).expect("valid"))
            .expect("insert");
        let live = insert(&conn, &draft(&input("Live", true), None).expect("valid"))
            .expect("insert");
        assert!(live.published_at.is_some());
        assert!(find_published(&conn, &hidden.id).expect("q").is_none());
        let listed = list_published(&conn, 10).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, live.id);
        assert_eq!(list_all(&conn).expect("all").len(), 2);
    }

    #[test]
    fn publishing_stamps_and_unpublishing_clears() {
        let conn = open_in_memory().expect("db");
        let a = insert(&conn, &draft(&input("Draft", false), None).expect("valid"))
            .expect("insert");
        let patch = ArticleInput {
            is_published: Some(true),
            ..Default::default()
        };
        let a = save(&conn, &apply(a, &patch).expect("valid")).expect("save");
        assert!(a.is_published);
        assert!(a.published_at.is_some());
        assert_eq!(a.title_en, "Draft");

        let patch = ArticleInput {
            is_published: Some(false),
            ..Default::default()
        };
        let a = save(&conn, &apply(a, &patch).expect("valid")).expect("save");
        assert!(a.published_at.is_none());
        assert!(delete(&conn, &a.id).expect("delete"));
        assert!(!delete(&conn, &a.id).expect("delete again"));
    }

    #[test]
    fn a_title_is_required() {
        let empty = ArticleInput::default();
        assert_eq!(draft(&empty, None).err(), Some(Msg::TitleRequired));
    }
}
