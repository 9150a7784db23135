use satchel_core::db::repository::UserRepository;
use satchel_core::models::user::NewUser;

/// Run the `user add` command.
pub async fn add(config_path: &str, email: &str, name: Option<String>) -> anyhow::Result<()> {
    let (_, repo) = super::open(config_path).await?;

    let user = repo
        .create_user(&NewUser {
            email: email.to_string(),
            name,
        })
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                anyhow::anyhow!("a user with email {email} already exists")
            } else {
                e.into()
            }
        })?;

    println!("Created user {} ({})", user.id, user.email);
    Ok(())
}
