use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::domain::{Member, MemberFilter, MemberUpdate, NewMember};
use crate::error::{require_text, ServiceError};
use crate::notifications::ActivityLogger;
use crate::store::{require, Database, Repository, RepositoryError};
use crate::tenancy::{Actor, Role, SchemaName};

/// User ids of active members, optionally restricted to `roles`.
pub(crate) fn active_user_ids(
    members: &dyn Repository<Member>,
    schema: &SchemaName,
    roles: Option<&[Role]>,
) -> Result<Vec<u64>, RepositoryError> {
    let mut ids: Vec<u64> = members
        .find(schema, &|member| {
            member.active && roles.map_or(true, |roles| roles.contains(&member.role))
        })?
        .into_iter()
        .map(|member| member.user_id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Directory name of `user_id`, if the user is registered.
pub(crate) fn display_name(
    members: &dyn Repository<Member>,
    schema: &SchemaName,
    user_id: u64,
) -> Result<Option<String>, RepositoryError> {
    Ok(members
        .find(schema, &|member| member.user_id == user_id)?
        .into_iter()
        .next()
        .map(|member| member.name))
}

fn admin_only(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "only administrators can {action} members"
        )))
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub struct MemberService {
    members: Arc<dyn Repository<Member>>,
    activity: Arc<ActivityLogger>,
}

impl MemberService {
    pub fn new(database: &Database, activity: Arc<ActivityLogger>) -> Self {
        Self {
            members: database.members.clone(),
            activity,
        }
    }

    pub fn create(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewMember,
    ) -> Result<Member, ServiceError> {
        admin_only(actor, "register")?;
        let name = require_text("name", &input.name)?;
        let now = Utc::now();
        let member = Member {
            id: 0,
            user_id: input.user_id,
            name,
            email: optional_text(input.email),
            phone: optional_text(input.phone),
            role: input.role,
            property_id: input.property_id,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let stored = self
            .members
            .insert_unique(schema, member, &|existing| existing.user_id == input.user_id)
            .map_err(|err| match err {
                RepositoryError::Conflict => ServiceError::conflict(format!(
                    "user {} is already a member",
                    input.user_id
                )),
                other => other.into(),
            })?;

        tracing::info!(%schema, member_id = stored.id, role = stored.role.label(), "member registered");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_MEMBER",
            "member",
            stored.id,
            json!({ "user_id": stored.user_id, "role": stored.role }),
        );
        Ok(stored)
    }

    pub fn list(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        filter: &MemberFilter,
    ) -> Result<Vec<Member>, ServiceError> {
        admin_only(actor, "list")?;
        let mut members = self.members.find(schema, &|member| filter.matches(member))?;
        members.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(members)
    }

    pub fn get(&self, schema: &SchemaName, actor: &Actor, id: u64) -> Result<Member, ServiceError> {
        let member = require(self.members.as_ref(), schema, id)?;
        if !actor.is_admin() && member.user_id != actor.user_id {
            return Err(ServiceError::not_found("member", id));
        }
        Ok(member)
    }

    pub fn update(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: MemberUpdate,
    ) -> Result<Member, ServiceError> {
        admin_only(actor, "edit")?;
        let name = update
            .name
            .as_deref()
            .map(|name| require_text("name", name))
            .transpose()?;
        let stored = self.members.modify(schema, id, &mut |member| {
            if let Some(name) = &name {
                member.name = name.clone();
            }
            if update.email.is_some() {
                member.email = optional_text(update.email.clone());
            }
            if update.phone.is_some() {
                member.phone = optional_text(update.phone.clone());
            }
            if let Some(role) = update.role {
                member.role = role;
            }
            if update.property_id.is_some() {
                member.property_id = update.property_id;
            }
            if let Some(active) = update.active {
                member.active = active;
            }
            member.updated_at = Utc::now();
            Ok(())
        })?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_MEMBER",
            "member",
            id,
            json!({ "role": stored.role, "active": stored.active }),
        );
        Ok(stored)
    }

    pub fn delete(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Member, ServiceError> {
        admin_only(actor, "remove")?;
        require(self.members.as_ref(), schema, id)?;
        let removed = self.members.delete(schema, id)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "DELETE_MEMBER",
            "member",
            id,
            json!({ "user_id": removed.user_id }),
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> MemberService {
        let database = Database::in_memory();
        let activity = Arc::new(ActivityLogger::new(database.activity.clone()));
        MemberService::new(&database, activity)
    }

    fn schema() -> SchemaName {
        SchemaName::parse("tenant_a").expect("valid schema")
    }

    fn member(user_id: u64, name: &str, role: Role) -> NewMember {
        NewMember {
            user_id,
            name: name.to_string(),
            email: None,
            phone: Some("  ".to_string()),
            role,
            property_id: None,
        }
    }

    #[test]
    fn user_ids_are_registered_once() {
        let service = service();
        let admin = Actor::admin(1);
        let stored = service
            .create(&schema(), &admin, member(10, "Lucía Gómez", Role::Resident))
            .expect("registered");
        assert_eq!(stored.phone, None);

        let err = service
            .create(&schema(), &admin, member(10, "Otra persona", Role::Staff))
            .expect_err("duplicate");
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn directory_lookups_skip_inactive_members() {
        let service = service();
        let admin = Actor::admin(1);
        service
            .create(&schema(), &admin, member(10, "Lucía", Role::Resident))
            .expect("lucía");
        let guard = service
            .create(&schema(), &admin, member(11, "Pedro", Role::Staff))
            .expect("pedro");
        service
            .create(&schema(), &admin, member(12, "Ana", Role::Staff))
            .expect("ana");
        service
            .update(
                &schema(),
                &admin,
                guard.id,
                MemberUpdate {
                    active: Some(false),
                    ..MemberUpdate::default()
                },
            )
            .expect("deactivated");

        let staff = active_user_ids(service.members.as_ref(), &schema(), Some(&[Role::Staff]))
            .expect("staff ids");
        assert_eq!(staff, vec![12]);
        let everyone =
            active_user_ids(service.members.as_ref(), &schema(), None).expect("all ids");
        assert_eq!(everyone, vec![10, 12]);
        assert_eq!(
            display_name(service.members.as_ref(), &schema(), 10).expect("lookup"),
            Some("Lucía".to_string())
        );
    }

    #[test]
    fn residents_see_only_their_own_entry() {
        let service = service();
        let stored = service
            .create(&schema(), &Actor::admin(1), member(10, "Lucía", Role::Resident))
            .expect("registered");
        assert!(service
            .get(&schema(), &Actor::resident(10), stored.id)
            .is_ok());
        let err = service
            .get(&schema(), &Actor::resident(11), stored.id)
            .expect_err("hidden");
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }
}
