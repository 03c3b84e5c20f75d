mod support;

use sqlx::Row;

use batchsync::records::{
    mapper::map_record, repository::RecordRepository, repository_sqlx::SqlxRecordRepository,
};
use batchsync::records::StoredRecord;
use support::{record, setup_db};

fn stored(id: i64) -> StoredRecord {
    map_record(record(id)).expect("valid record")
}

#[tokio::test]
async fn exists_reflects_inserted_identities() {
    let db = setup_db().await;
    let repo = SqlxRecordRepository::new(db.pool.clone());

    assert!(!repo.exists(1).await.unwrap());
    repo.insert_batch(&[stored(1), stored(2)]).await.unwrap();

    assert!(repo.exists(1).await.unwrap());
    assert!(repo.exists(2).await.unwrap());
    assert!(!repo.exists(3).await.unwrap());
}

#[tokio::test]
async fn dates_are_stored_as_plain_text() {
    let db = setup_db().await;
    let repo = SqlxRecordRepository::new(db.pool.clone());

    repo.insert_batch(&[stored(10)]).await.unwrap();

    let row = sqlx::query("SELECT classified_at, contact FROM interactions WHERE interaction_id = ?")
        .bind(10_i64)
        .fetch_one(&db.pool)
        .await
        .unwrap();

    assert_eq!(
        row.get::<Option<String>, _>("classified_at").as_deref(),
        Some("2024-01-01 09:30:00")
    );
    assert_eq!(
        row.get::<Option<String>, _>("contact").as_deref(),
        Some("contact-10")
    );
}

#[tokio::test]
async fn chunk_with_conflicting_identity_rolls_back_entirely() {
    let db = setup_db().await;
    let repo = SqlxRecordRepository::new(db.pool.clone());

    repo.insert_batch(&[stored(1)]).await.unwrap();

    let err = repo
        .insert_batch(&[stored(2), stored(1), stored(3)])
        .await
        .unwrap_err();
    assert!(!format!("{err:#}").is_empty());

    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM interactions")
        .fetch_one(&db.pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(count, 1);
    assert!(!repo.exists(2).await.unwrap());
}
