use paynow_pos_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement, Value};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let tenant_id = Uuid::new_v4();
    let counter_key = ensure_terminal(&orm, tenant_id, "Counter 1", "counter-1-display").await?;
    let kiosk_key = ensure_terminal(&orm, tenant_id, "Kiosk", "kiosk-display").await?;

    println!("Seed completed.");
    println!("Tenant ID: {tenant_id}");
    println!("Device keys: {counter_key}, {kiosk_key}");
    Ok(())
}

async fn ensure_terminal(
    orm: &DatabaseConnection,
    tenant_id: Uuid,
    label: &str,
    device_key: &str,
) -> anyhow::Result<String> {
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_sql_and_values(
        backend,
        r#"
        INSERT INTO terminals (id, tenant_id, label, device_key)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (device_key) DO NOTHING
        "#,
        [
            Value::from(Uuid::new_v4()),
            Value::from(tenant_id),
            Value::from(label),
            Value::from(device_key),
        ],
    ))
    .await?;
    Ok(device_key.to_string())
}
