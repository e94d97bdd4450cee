use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Users
    create_indexes(
        db,
        "users",
        vec![
            index_unique(bson::doc! { "email": 1 }),
            index_unique(bson::doc! { "username": 1 }),
        ],
    )
    .await?;

    // Ideas
    create_indexes(
        db,
        "ideas",
        vec![
            index(bson::doc! { "founder_id": 1, "created_at": -1 }),
            index(bson::doc! { "status": 1, "created_at": -1 }),
        ],
    )
    .await?;

    // Negotiations
    create_indexes(
        db,
        "negotiations",
        vec![
            index(bson::doc! { "founder_id": 1, "created_at": -1 }),
            index(bson::doc! { "investor_id": 1, "created_at": -1 }),
            index_unique(bson::doc! { "idea_id": 1, "investor_id": 1 }),
            index(bson::doc! { "status": 1 }),
        ],
    )
    .await?;

    // Notifications
    create_indexes(
        db,
        "notifications",
        vec![
            index(bson::doc! { "user_id": 1, "timestamp": -1 }),
            index(bson::doc! { "user_id": 1, "is_read": 1 }),
        ],
    )
    .await?;

    // Connection Requests
    create_indexes(
        db,
        "connection_requests",
        vec![
            index_unique(bson::doc! { "from_user_id": 1, "to_user_id": 1 }),
            index(bson::doc! { "to_user_id": 1, "status": 1 }),
        ],
    )
    .await?;

    // Idea Join Requests
    create_indexes(
        db,
        "idea_join_requests",
        vec![
            index_unique(bson::doc! { "idea_id": 1, "user_id": 1 }),
            index(bson::doc! { "founder_id": 1, "status": 1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
