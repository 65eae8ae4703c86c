//! User aggregate: platform accounts, credentials and profile state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use amo_core::{Aggregate, AggregateRoot, DomainError, DomainEvent, EmailAddress, UserId};

use crate::Role;

// ─────────────────────────────────────────────────────────────────────────────
// User Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Platform account.
///
/// # Invariants
/// - `email` is stored normalized (trimmed, lower-case).
/// - `password_hash` is never empty once created.
/// - An ADMIN is never demoted by a role promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub must_change_password: bool,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub last_password_change: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    pub created: bool,
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            email: String::new(),
            name: None,
            password_hash: String::new(),
            role: Role::User,
            must_change_password: false,
            phone_number: None,
            profile_picture: None,
            last_password_change: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
            version: 0,
            created: false,
        }
    }

    /// Public view of the account (no credential material).
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            must_change_password: self.must_change_password,
            phone_number: self.phone_number.clone(),
            profile_picture: self.profile_picture.clone(),
            last_password_change: self.last_password_change,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("user"));
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Serializable account view returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub must_change_password: bool,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub last_password_change: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub must_change_password: bool,
    pub phone_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Replace the credential. The caller verifies the current password first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    pub user_id: UserId,
    pub new_password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub user_id: UserId,
    pub name: String,
    pub phone_number: String,
    pub profile_picture: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteRole {
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

/// Administrative edit from the user management screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUpdate {
    pub user_id: UserId,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub must_change_password: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    ChangePassword(ChangePassword),
    UpdateProfile(UpdateProfile),
    PromoteRole(PromoteRole),
    AdminUpdate(AdminUpdate),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub must_change_password: bool,
    pub phone_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub user_id: UserId,
    pub new_password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

/// Profile fields before and after an update (feeds the activity log).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub user_id: UserId,
    pub previous: ProfileFields,
    pub current: ProfileFields,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChanged {
    pub user_id: UserId,
    pub from: Role,
    pub to: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUpdated {
    pub user_id: UserId,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub must_change_password: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Registered(UserRegistered),
    PasswordChanged(PasswordChanged),
    ProfileUpdated(ProfileUpdated),
    RoleChanged(RoleChanged),
    AdminUpdated(AdminUpdated),
}

impl DomainEvent for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Registered(_) => "auth.user.registered",
            UserEvent::PasswordChanged(_) => "auth.user.password_changed",
            UserEvent::ProfileUpdated(_) => "auth.user.profile_updated",
            UserEvent::RoleChanged(_) => "auth.user.role_changed",
            UserEvent::AdminUpdated(_) => "auth.user.admin_updated",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Registered(e) => e.occurred_at,
            UserEvent::PasswordChanged(e) => e.occurred_at,
            UserEvent::ProfileUpdated(e) => e.occurred_at,
            UserEvent::RoleChanged(e) => e.occurred_at,
            UserEvent::AdminUpdated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Registered(e) => self.apply_registered(e),
            UserEvent::PasswordChanged(e) => {
                self.password_hash = e.new_password_hash.clone();
                self.must_change_password = false;
                self.last_password_change = Some(e.occurred_at);
            }
            UserEvent::ProfileUpdated(e) => {
                self.name = e.current.name.clone();
                self.phone_number = e.current.phone_number.clone();
                self.profile_picture = e.current.profile_picture.clone();
            }
            UserEvent::RoleChanged(e) => self.role = e.to,
            UserEvent::AdminUpdated(e) => {
                if let Some(name) = &e.name {
                    self.name = Some(name.clone());
                }
                if let Some(role) = e.role {
                    self.role = role;
                }
                if let Some(flag) = e.must_change_password {
                    self.must_change_password = flag;
                }
            }
        }
        self.updated_at = event.occurred_at();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => self.handle_register(cmd),
            UserCommand::ChangePassword(cmd) => self.handle_change_password(cmd),
            UserCommand::UpdateProfile(cmd) => self.handle_update_profile(cmd),
            UserCommand::PromoteRole(cmd) => self.handle_promote(cmd),
            UserCommand::AdminUpdate(cmd) => self.handle_admin_update(cmd),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl User {
    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }
        let email = EmailAddress::parse(&cmd.email)?;
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password is required"));
        }

        Ok(vec![UserEvent::Registered(UserRegistered {
            user_id: cmd.user_id,
            email: email.into(),
            name: non_blank(cmd.name.as_deref()),
            password_hash: cmd.password_hash.clone(),
            role: cmd.role,
            must_change_password: cmd.must_change_password,
            phone_number: non_blank(cmd.phone_number.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_password(&self, cmd: &ChangePassword) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_created()?;
        if cmd.new_password_hash.is_empty() {
            return Err(DomainError::validation("new password is required"));
        }
        Ok(vec![UserEvent::PasswordChanged(PasswordChanged {
            user_id: self.id,
            new_password_hash: cmd.new_password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_profile(&self, cmd: &UpdateProfile) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_created()?;
        let (Some(name), Some(phone_number)) =
            (non_blank(Some(cmd.name.as_str())), non_blank(Some(cmd.phone_number.as_str())))
        else {
            return Err(DomainError::validation("Name and phone number are required"));
        };

        let previous = ProfileFields {
            name: self.name.clone(),
            phone_number: self.phone_number.clone(),
            profile_picture: self.profile_picture.clone(),
        };
        let current = ProfileFields {
            name: Some(name),
            phone_number: Some(phone_number),
            profile_picture: non_blank(cmd.profile_picture.as_deref())
                .or_else(|| self.profile_picture.clone()),
        };

        Ok(vec![UserEvent::ProfileUpdated(ProfileUpdated {
            user_id: self.id,
            previous,
            current,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Promotion is idempotent and never lowers an ADMIN.
    fn handle_promote(&self, cmd: &PromoteRole) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_created()?;
        if self.role == cmd.role || self.role.is_admin() {
            return Ok(vec![]);
        }
        Ok(vec![UserEvent::RoleChanged(RoleChanged {
            user_id: self.id,
            from: self.role,
            to: cmd.role,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_admin_update(&self, cmd: &AdminUpdate) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_created()?;
        let name = match cmd.name.as_deref() {
            Some(raw) => Some(
                non_blank(Some(raw)).ok_or_else(|| DomainError::validation("name cannot be empty"))?,
            ),
            None => None,
        };
        if name.is_none() && cmd.role.is_none() && cmd.must_change_password.is_none() {
            return Err(DomainError::validation("nothing to update"));
        }
        Ok(vec![UserEvent::AdminUpdated(AdminUpdated {
            user_id: self.id,
            name,
            role: cmd.role,
            must_change_password: cmd.must_change_password,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn apply_registered(&mut self, e: &UserRegistered) {
        self.id = e.user_id;
        self.email = e.email.clone();
        self.name = e.name.clone();
        self.password_hash = e.password_hash.clone();
        self.role = e.role;
        self.must_change_password = e.must_change_password;
        self.phone_number = e.phone_number.clone();
        self.created_at = e.occurred_at;
        self.created = true;
    }
}

/// Build a registered user in memory (tests in this and downstream crates).
#[doc(hidden)]
pub fn registered_for_tests(email: &str, role: Role, phone_number: Option<&str>) -> User {
    let mut user = User::empty(UserId::new());
    let cmd = UserCommand::Register(RegisterUser {
        user_id: user.id,
        email: email.to_string(),
        name: Some("Test User".to_string()),
        password_hash: "$argon2id$placeholder".to_string(),
        role,
        must_change_password: false,
        phone_number: phone_number.map(str::to_string),
        occurred_at: Utc::now(),
    });
    if let Ok(events) = user.handle(&cmd) {
        for event in &events {
            user.apply(event);
        }
    }
    user
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
