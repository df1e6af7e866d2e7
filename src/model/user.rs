use secrecy::{ExposeSecret as _, SecretString};

use super::*;

/// A user account as exposed to clients. The password hash never leaves the store.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    #[serde_as(serialize_as = "Key")]
    pub id: Record<User>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: Timestamp,
}

define_table!("users" : User);

#[derive(new)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: Option<&'a str>,
    pub is_admin: bool,
    #[new(value = "true")]
    pub is_active: bool,
}

/// Columns an account update may touch. Absent fields keep their stored value.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    /// `Some(None)` clears the display name.
    pub name: Option<Option<String>>,
    pub password: Option<SecretString>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    fn assignments(&self) -> Vec<&'static str> {
        let mut set = Vec::new();
        if self.email.is_some() {
            set.push("email = $email");
        }
        if self.name.is_some() {
            set.push("name = $name");
        }
        if self.password.is_some() {
            set.push("password = crypto::argon2::generate($password)");
        }
        if self.is_admin.is_some() {
            set.push("is_admin = $is_admin");
        }
        if self.is_active.is_some() {
            set.push("is_active = $is_active");
        }
        set
    }
}

define_relation! {
    User > by_credentials(email: &str, password: &str) > Option<User>
        where "SELECT id, email, name, is_admin, is_active, created_at FROM users
               WHERE (email = $email) AND (is_active = true) AND crypto::argon2::compare(password, $password)
               LIMIT 1"
}

define_relation! {
    User > by_email(email: &str) > Option<User>
        where "SELECT id, email, name, is_admin, is_active, created_at FROM users WHERE email = $email LIMIT 1"
}

define_relation! {
    User > find(user: &Record<User>) > Option<User>
        where "SELECT id, email, name, is_admin, is_active, created_at FROM $user"
}

define_relation! {
    User > list() > Vec<User>
        where "SELECT id, email, name, is_admin, is_active, created_at FROM users ORDER BY created_at DESC"
}

impl User {
    /// Creates the account, hashing the password with argon2 inside the store.
    #[tracing::instrument(skip(user, db), fields(email = user.email))]
    pub async fn create(user: &NewUser<'_>, db: &Database) -> Result<User, DatabaseQueryError> {
        db.sql(
            "CREATE users SET
                email = $email,
                name = $name,
                password = crypto::argon2::generate($password),
                is_admin = $is_admin,
                is_active = $is_active
            RETURN id, email, name, is_admin, is_active, created_at",
        )
        .bind(("email", user.email))
        .bind(("name", user.name))
        .bind(("password", user.password))
        .bind(("is_admin", user.is_admin))
        .bind(("is_active", user.is_active))
        .fetch_one()
        .await
    }

    /// Applies `changes` to an existing account. Returns [None] when the account does not exist.
    #[tracing::instrument(skip(changes, db))]
    pub async fn update(
        user: &Record<User>,
        changes: &UserChanges,
        db: &Database,
    ) -> Result<Option<User>, DatabaseQueryError> {
        if changes.is_empty() {
            return User::find(user, db).await;
        }

        db.sql(format!(
            "UPDATE $user SET {} WHERE id RETURN id, email, name, is_admin, is_active, created_at",
            changes.assignments().join(", ")
        ))
        .bind(("user", user))
        .bind(("email", &changes.email))
        .bind(("name", changes.name.clone().flatten()))
        .bind(("password", changes.password.as_ref().map(|password| password.expose_secret().as_str())))
        .bind(("is_admin", changes.is_admin))
        .bind(("is_active", changes.is_active))
        .fetch_first()
        .await
    }

    /// Replaces the password, but only when `current` matches the stored hash. Returns whether it did.
    #[tracing::instrument(skip(current, new, db))]
    pub async fn change_password(
        user: &Record<User>,
        current: &str,
        new: &str,
        db: &Database,
    ) -> Result<bool, DatabaseQueryError> {
        let changed: Option<User> = db
            .sql(
                "UPDATE $user SET password = crypto::argon2::generate($new)
                WHERE crypto::argon2::compare(password, $current)
                RETURN id, email, name, is_admin, is_active, created_at",
            )
            .bind(("user", user))
            .bind(("current", current))
            .bind(("new", new))
            .fetch_first()
            .await?;

        Ok(changed.is_some())
    }

    /// Removes the account together with its likes and watch history.
    #[tracing::instrument(skip(db))]
    pub async fn delete(id: &Record<User>, db: &Database) -> Result<(), DatabaseQueryError> {
        db.sql(
            "BEGIN TRANSACTION;
            DELETE likes WHERE user = $user;
            DELETE view_history WHERE user = $user;
            DELETE $user;
            COMMIT TRANSACTION;",
        )
        .bind(("user", id))
        .execute()
        .await?;

        Ok(())
    }
}
