//! Document store operations.
//!
//! Structured records are JSON documents keyed by `(collection, id)`.
//! Typed helpers below cover the collections the pipeline writes.

use super::connection::Store;
use super::kv::escape_glob;
use crate::Error;
use crate::models::{ExchangeSnapshot, IsoPost, Listing, UserSwap};
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// Collection names.
pub mod collections {
    pub const LISTINGS: &str = "listings";
    pub const SELLERS: &str = "sellers";
    pub const ISO_POSTS: &str = "iso_posts";
    pub const EXCHANGE: &str = "exchange";
}

/// Id of the single exchange snapshot document.
const LATEST_EXCHANGE: &str = "latest";

impl Store {
    /// Insert or replace a document.
    ///
    /// `created_at` is kept from the first insert; `updated_at` tracks the last write.
    pub async fn upsert_document<T: Serialize + ?Sized>(
        &self, collection: &str, id: &str, doc: &T,
    ) -> Result<(), Error> {
        let collection = collection.to_string();
        let id = id.to_string();
        let body = serde_json::to_string(doc)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO documents (collection, id, body, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?4)
                    ON CONFLICT(collection, id) DO UPDATE SET
                        body = excluded.body,
                        updated_at = excluded.updated_at",
                    params![collection, id, body, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a document by id.
    ///
    /// Returns None if the id doesn't exist in the collection.
    pub async fn get_document<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>, Error> {
        let collection = collection.to_string();
        let id = id.to_string();
        let body: Option<String> = self
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                conn.query_row(
                    "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(Error::from)
            })
            .await
            .map_err(Error::from)?;

        body.map(|b| serde_json::from_str(&b).map_err(Error::from))
            .transpose()
    }

    /// All documents of a collection, ordered by id.
    pub async fn list_documents<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, Error> {
        self.query_documents(collection, "*").await
    }

    /// Documents whose id matches a raw SQLite `GLOB` pattern, ordered by id.
    async fn query_documents<T: DeserializeOwned>(&self, collection: &str, id_glob: &str) -> Result<Vec<T>, Error> {
        let collection = collection.to_string();
        let id_glob = id_glob.to_string();
        let bodies: Vec<String> = self
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT body FROM documents WHERE collection = ?1 AND id GLOB ?2 ORDER BY id")?;
                let bodies = stmt
                    .query_map(params![collection, id_glob], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(bodies)
            })
            .await
            .map_err(Error::from)?;

        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(Error::from))
            .collect()
    }

    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, Error> {
        let collection = collection.to_string();
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count =
                    conn.execute("DELETE FROM documents WHERE collection = ?1 AND id = ?2", params![collection, id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_documents(&self, collection: &str) -> Result<u64, Error> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM documents WHERE collection = ?1", params![collection], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn upsert_listing(&self, listing: &Listing) -> Result<(), Error> {
        self.upsert_document(collections::LISTINGS, &listing.document_id(), listing)
            .await
    }

    /// Listings parsed from one sheet, in row order.
    pub async fn listings_for_sheet(&self, sheet_id: &str) -> Result<Vec<Listing>, Error> {
        let mut listings: Vec<Listing> = self
            .query_documents(collections::LISTINGS, &listing_prefix(sheet_id))
            .await?
            .into_iter()
            .filter(|l: &Listing| l.sheet_id == sheet_id)
            .collect();
        listings.sort_by_key(|l| l.row);
        Ok(listings)
    }

    /// Replace every listing of a sheet in one transaction.
    ///
    /// Re-parsing a sheet with fewer rows leaves no stale listings behind.
    pub async fn replace_listings_for_sheet(&self, sheet_id: &str, listings: &[Listing]) -> Result<usize, Error> {
        let sheet_id = sheet_id.to_string();
        let now = Utc::now().to_rfc3339();
        let docs = listings
            .iter()
            .map(|l| Ok((l.document_id(), serde_json::to_string(l)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id GLOB ?2",
                    params![collections::LISTINGS, listing_prefix(&sheet_id)],
                )?;
                for (id, body) in &docs {
                    tx.execute(
                        "INSERT INTO documents (collection, id, body, created_at, updated_at)
                        VALUES (?1, ?2, ?3, ?4, ?4)
                        ON CONFLICT(collection, id) DO UPDATE SET
                            body = excluded.body,
                            updated_at = excluded.updated_at",
                        params![collections::LISTINGS, id, body, now],
                    )?;
                }
                tx.commit()?;
                Ok(docs.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Merge a seller's transactions into their stored record.
    ///
    /// Usernames are matched case-insensitively. Returns the number of new transactions.
    pub async fn upsert_seller(&self, swap: UserSwap) -> Result<usize, Error> {
        let id = swap.username.to_lowercase();
        let (record, added) = match self.get_document::<UserSwap>(collections::SELLERS, &id).await? {
            Some(mut existing) => {
                let added = existing.merge(swap);
                (existing, added)
            }
            None => {
                let added = swap.transactions.len();
                (swap, added)
            }
        };
        self.upsert_document(collections::SELLERS, &id, &record).await?;
        Ok(added)
    }

    pub async fn get_seller(&self, username: &str) -> Result<Option<UserSwap>, Error> {
        self.get_document(collections::SELLERS, &username.to_lowercase())
            .await
    }

    pub async fn upsert_iso_post(&self, post: &IsoPost) -> Result<(), Error> {
        self.upsert_document(collections::ISO_POSTS, &post.post.id, post)
            .await
    }

    pub async fn put_exchange_snapshot(&self, snapshot: &ExchangeSnapshot) -> Result<(), Error> {
        self.upsert_document(collections::EXCHANGE, LATEST_EXCHANGE, snapshot)
            .await
    }

    pub async fn latest_exchange_snapshot(&self) -> Result<Option<ExchangeSnapshot>, Error> {
        self.get_document(collections::EXCHANGE, LATEST_EXCHANGE).await
    }
}

/// Case-sensitive `GLOB` matching every listing id of a sheet.
fn listing_prefix(sheet_id: &str) -> String {
    format!("{}:*", escape_glob(sheet_id))
}
