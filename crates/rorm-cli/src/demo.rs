//! Walkthrough of every engine operation against an in-memory store.

use rorm::mapper::to_hash;
use rorm::{AutoLoad, Context, FieldUpdates, LoadError, Orm, OrmError, OrmResult, Record};

#[derive(Debug, Default, Clone, Record)]
#[redis(name = "demo::Profile")]
pub struct Profile {
    #[redis("primary")]
    pub user_id: String,
    pub bio: String,
    pub languages: Vec<String>,
}

#[derive(Debug, Default, Clone, Record)]
#[redis(name = "demo::User")]
pub struct User {
    #[redis("primary")]
    pub id: String,
    pub name: String,
    pub age: u32,
    pub active: bool,
    #[redis("foreignKey:id")]
    pub profile: Option<Profile>,
    #[redis("-")]
    pub scratch: String,
}

#[derive(Debug, Default, Record)]
#[redis(name = "demo::Quota", loader)]
pub struct Quota {
    #[redis("primary")]
    pub user_id: String,
    pub limit: u64,
}

impl AutoLoad for Quota {
    fn load(&mut self) -> Result<(), LoadError> {
        self.limit = 100;
        Ok(())
    }
}

/// One observable step of the walkthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub action: &'static str,
    pub key: String,
    pub detail: String,
}

impl Step {
    fn new(action: &'static str, key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            action,
            key: key.into(),
            detail: detail.into(),
        }
    }
}

fn user(index: usize) -> User {
    let id = format!("u{index}");
    User {
        id: id.clone(),
        name: format!("user-{index}"),
        age: 20 + index as u32,
        active: index % 2 == 0,
        profile: Some(Profile {
            user_id: id,
            bio: format!("bio of user-{index}"),
            languages: vec!["en".into()],
        }),
        scratch: "not stored".into(),
    }
}

pub async fn run(orm: &Orm, ctx: &Context, records: usize) -> OrmResult<Vec<Step>> {
    let mut steps = Vec::new();
    let records = records.max(1);

    let create = orm.query().association(true);
    for index in 0..records {
        let record = user(index);
        create.create(ctx, &record).await?;
        steps.push(Step::new("create", orm.key_of(&record)?, record.name.clone()));
    }

    let mut first = User {
        id: "u0".into(),
        ..User::default()
    };
    orm.query().association(true).find(ctx, &mut first).await?;
    let bio = first
        .profile
        .as_ref()
        .map(|p| p.bio.clone())
        .unwrap_or_default();
    steps.push(Step::new(
        "find",
        orm.key_of(&first)?,
        format!("name={} age={} profile.bio={bio:?}", first.name, first.age),
    ));

    let users: Vec<User> = orm.query().where_type::<User>().find_all(ctx).await?;
    steps.push(Step::new(
        "scan",
        User::record_schema().key_pattern(),
        format!("{} users", users.len()),
    ));

    orm.query().update(ctx, &first, "age", 99u32).await?;
    let updates = FieldUpdates::new()
        .set("name", "renamed".to_string())
        .set("active", false);
    orm.query().updates(ctx, &first, &updates).await?;
    let mut reread = User {
        id: "u0".into(),
        ..User::default()
    };
    orm.query().find(ctx, &mut reread).await?;
    steps.push(Step::new(
        "update",
        orm.key_of(&reread)?,
        format!(
            "name={} age={} active={}",
            reread.name, reread.age, reread.active
        ),
    ));

    let mut fields: Vec<_> = to_hash(&reread)?.into_iter().collect();
    fields.sort();
    let rendered: Vec<_> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
    steps.push(Step::new("hash", orm.key_of(&reread)?, rendered.join(" ")));

    let mut selected = User {
        id: "u0".into(),
        ..User::default()
    };
    orm.query().select(["name"]).find(ctx, &mut selected).await?;
    steps.push(Step::new(
        "select",
        orm.key_of(&selected)?,
        format!("name={} age={}", selected.name, selected.age),
    ));

    let mut quota = Quota {
        user_id: "u0".into(),
        ..Quota::default()
    };
    let outcome = orm.query().auto_load(true).find(ctx, &mut quota).await?;
    let persisted = match outcome.into_persist() {
        Some(handle) => handle.wait().await.is_ok(),
        None => false,
    };
    steps.push(Step::new(
        "auto-load",
        orm.key_of(&quota)?,
        format!("limit={} persisted={persisted}", quota.limit),
    ));

    let mut missing = User {
        id: "nobody".into(),
        ..User::default()
    };
    let detail = match orm.query().find(ctx, &mut missing).await {
        Err(OrmError::DataNotFound(_)) => "no data found".to_string(),
        Err(e) => return Err(e),
        Ok(_) => "unexpectedly found".to_string(),
    };
    steps.push(Step::new("miss", orm.key_of(&missing)?, detail));

    Ok(steps)
}
