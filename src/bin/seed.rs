use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use tambal_ban_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let user_id = ensure_user(&pool, "budi@example.com", "Budi Santoso", "rahasia123").await?;
    let locations = seed_locations(&pool).await?;

    println!("Seed completed. User ID: {user_id}, locations: {locations}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    full_name: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, full_name, password_hash)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(full_name)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    Ok(user_id)
}

async fn seed_locations(pool: &sqlx::PgPool) -> anyhow::Result<usize> {
    let locations = [
        (
            "Tambal Ban Pak Joko",
            "Jl. Kaliurang KM 5, Sleman, Yogyakarta",
            -7.7520,
            110.3830,
            "0274-555-0101",
        ),
        (
            "Bengkel Ban Sumber Rejeki",
            "Jl. Magelang KM 7, Sleman, Yogyakarta",
            -7.7390,
            110.3610,
            "0274-555-0102",
        ),
        (
            "Tambal Ban 24 Jam Mas Agus",
            "Jl. Parangtritis No. 88, Bantul, Yogyakarta",
            -7.8290,
            110.3650,
            "0274-555-0103",
        ),
    ];

    for (name, address, latitude, longitude, phone) in locations {
        sqlx::query(
            r#"
            INSERT INTO locations (name, address, latitude, longitude, phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(address)
        .bind(latitude)
        .bind(longitude)
        .bind(phone)
        .execute(pool)
        .await?;
    }

    println!("Seeded locations");
    Ok(locations.len())
}
