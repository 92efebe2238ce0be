use std::collections::BTreeSet;
use std::sync::Arc;

use archivum_auth::{
    Action, InMemoryUserStore, ObjectKind, RoleAssignment, RoleName, RoleRight, User, UserLookup, UserStore,
};
use archivum_core::{DomainError, DomainResult, RepositoryConfig};
use archivum_gateway::{ApiError, CallerContext, PolicyRegistry, SecuredRepository, Status};
use archivum_repository::{
    AuditAction, Binary, ContentModel, Entity, EntityState, InMemoryAuditStore, InMemoryContentModelStore,
    InMemoryEntityStore,
};
use serde_json::json;

struct TestRepository {
    repo: SecuredRepository,
    admin: CallerContext,
}

impl TestRepository {
    /// level1 "l1" -> level2 "l2" -> data "e", created by the administrator.
    fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(Arc::new(InMemoryUserStore::new()))
    }

    fn spawn_with(users: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        archivum_observability::init();

        let repo = SecuredRepository::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(InMemoryContentModelStore::new()),
            users,
            Arc::new(InMemoryAuditStore::new()),
            PolicyRegistry::standard(),
            RepositoryConfig::default(),
        );
        let root = repo.bootstrap_admin(User::new("root", "root@example.org"), "root-secret")?;
        let admin = CallerContext::authenticated(root);

        repo.create_entity(&admin, Entity::new("l1", "level1"))?;
        repo.create_entity(&admin, Entity::new("l2", "level2").with_parent("l1"))?;
        repo.create_entity(&admin, Entity::new("e", "data").with_parent("l2"))?;

        Ok(Self { repo, admin })
    }

    fn user_with(&self, name: &str, role: RoleAssignment) -> anyhow::Result<CallerContext> {
        let user = self.repo.create_user(
            &self.admin,
            User::new(name, format!("{name}@example.org")).with_role(role),
            "user-secret",
        )?;
        Ok(CallerContext::authenticated(user))
    }

    fn plain_user(&self, name: &str) -> anyhow::Result<CallerContext> {
        let user = self.repo.create_user(
            &self.admin,
            User::new(name, format!("{name}@example.org")),
            "user-secret",
        )?;
        Ok(CallerContext::authenticated(user))
    }
}

/// User store whose rights cleanup fails for one anchor.
struct StuckAnchor {
    inner: InMemoryUserStore,
    anchor: &'static str,
}

impl UserLookup for StuckAnchor {
    fn retrieve(&self, name: &str) -> DomainResult<User> {
        self.inner.retrieve(name)
    }

    fn exists(&self, name: &str) -> DomainResult<bool> {
        self.inner.exists(name)
    }
}

impl UserStore for StuckAnchor {
    fn create(&self, user: User) -> DomainResult<()> {
        self.inner.create(user)
    }

    fn update(&self, user: User) -> DomainResult<()> {
        self.inner.update(user)
    }

    fn delete(&self, name: &str) -> DomainResult<()> {
        self.inner.delete(name)
    }

    fn list(&self) -> DomainResult<Vec<User>> {
        self.inner.list()
    }

    fn delete_rights(&self, anchor: &str) -> DomainResult<usize> {
        if anchor == self.anchor {
            return Err(DomainError::backend("user index unavailable"));
        }
        self.inner.delete_rights(anchor)
    }
}

fn status<T: std::fmt::Debug>(result: Result<T, ApiError>) -> Status {
    result.expect_err("operation should have been refused").status()
}

fn metadata_right(action: Action, state: EntityState) -> RoleRight {
    RoleRight::content(action, ObjectKind::Metadata, state)
}

#[test]
fn pending_metadata_reader_may_read_but_not_write() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    let reader = t.user_with(
        "ursula",
        RoleAssignment::new(RoleName::User)
            .with_rights("l2", [metadata_right(Action::Read, EntityState::Pending)]),
    )?;

    let entity = t.repo.retrieve_entity(&reader, "e")?;
    assert_eq!(entity.id, "e");

    let mut changed = entity.clone();
    changed.label = "renamed".into();
    assert_eq!(status(t.repo.update_entity(&reader, changed)), Status::Forbidden);
    Ok(())
}

#[test]
fn anonymous_callers_only_reach_open_operations() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    let anonymous = CallerContext::anonymous();

    let models = t.repo.list_content_models(&anonymous)?;
    assert!(models.iter().any(|m| m.id == "data"));
    t.repo.retrieve_content_model(&anonymous, "level2")?;

    assert_eq!(status(t.repo.retrieve_entity(&anonymous, "e")), Status::Unauthenticated);
    assert_eq!(status(t.repo.submit_entity(&anonymous, "e")), Status::Unauthenticated);
    assert_eq!(
        status(t.repo.create_user(
            &anonymous,
            User::new("mallory", "mallory@example.org"),
            "user-secret"
        )),
        Status::Unauthenticated
    );
    Ok(())
}

#[test]
fn last_administrator_can_not_be_deleted() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;

    let err = t.repo.delete_user(&t.admin, "root").unwrap_err();
    assert_eq!(err.status(), Status::BadRequest);
    assert!(err.to_string().contains("last remaining Administrator"));

    t.repo.retrieve_user(&t.admin, "root")?;

    for demotion in [
        t.repo.set_roles(&t.admin, "root", Vec::new()),
        t.repo.set_right(&t.admin, "root", RoleName::Admin, "", BTreeSet::new()),
    ] {
        let err = demotion.unwrap_err();
        assert_eq!(err.status(), Status::BadRequest);
        assert!(err.to_string().contains("last remaining Administrator"));
    }
    assert!(t.repo.retrieve_user(&t.admin, "root")?.is_admin());
    Ok(())
}

#[test]
fn data_entity_below_level1_is_rejected() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;

    let result = t
        .repo
        .create_entity(&t.admin, Entity::new("orphan", "data").with_parent("l1"));
    assert_eq!(status(result), Status::BadRequest);
    Ok(())
}

#[test]
fn writer_walks_an_entity_through_its_lifecycle() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    let writer = t.user_with(
        "walter",
        RoleAssignment::new(RoleName::User).with_rights(
            "l2",
            [
                metadata_right(Action::Write, EntityState::Pending),
                metadata_right(Action::Write, EntityState::Submitted),
                metadata_right(Action::Read, EntityState::Published),
            ],
        ),
    )?;

    let id = t
        .repo
        .create_entity(&writer, Entity::new("", "data").with_parent("l2"))?;
    assert!(!id.is_empty());

    let submitted = t.repo.submit_entity(&writer, &id)?;
    assert_eq!(submitted.state, EntityState::Submitted);
    assert_eq!(submitted.version, 2);

    let published = t.repo.publish_entity(&writer, &id)?;
    assert_eq!(published.state, EntityState::Published);

    // no WRITE_PUBLISHED_METADATA
    assert_eq!(status(t.repo.withdraw_entity(&writer, &id)), Status::Forbidden);
    let withdrawn = t.repo.withdraw_entity(&t.admin, &id)?;
    assert_eq!(withdrawn.state, EntityState::Withdrawn);

    // WITHDRAWN is final
    assert_eq!(status(t.repo.pending_entity(&t.admin, &id)), Status::BadRequest);

    let history = t.repo.old_versions(&t.admin, &id)?;
    assert_eq!(history.len(), 3);
    let first = t.repo.retrieve_entity_version(&t.admin, &id, 1)?;
    assert_eq!(first.state, EntityState::Pending);
    Ok(())
}

#[test]
fn binary_rights_are_separate_from_metadata_rights() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    let writer = t.user_with(
        "bea",
        RoleAssignment::new(RoleName::User).with_rights(
            "l2",
            [
                metadata_right(Action::Write, EntityState::Pending),
                RoleRight::content(Action::Read, ObjectKind::Binary, EntityState::Pending),
            ],
        ),
    )?;

    assert_eq!(
        status(t.repo.add_binary(&writer, "e", Binary::new("scan.tif", "image/tiff", 1024))),
        Status::Forbidden
    );
    t.repo
        .add_binary(&t.admin, "e", Binary::new("scan.tif", "image/tiff", 1024))?;

    let binary = t.repo.retrieve_binary(&writer, "e", "scan.tif")?;
    assert_eq!(binary.size, 1024);
    assert_eq!(status(t.repo.retrieve_binary(&writer, "e", "missing.tif")), Status::NotFound);

    t.repo.add_relation(&writer, "e", "isPartOf", "<archivum:l2>")?;
    t.repo.add_identifier(&writer, "e", "DOI", "10.1000/182")?;
    Ok(())
}

#[test]
fn level1_admin_manages_its_own_subtree() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    let lena = t.user_with(
        "lena",
        RoleAssignment::new(RoleName::Level1Admin).with_rights("l1", [RoleRight::READ, RoleRight::WRITE]),
    )?;
    let ursula = t.plain_user("ursula")?;

    t.repo.retrieve_entity(&lena, "l2")?;
    // data entities need the USER role
    assert_eq!(status(t.repo.retrieve_entity(&lena, "e")), Status::Forbidden);

    t.repo
        .create_content_model(&lena, ContentModel::new("permission", "Permission", ["level2"]))?;
    assert_eq!(t.repo.list_users(&lena)?.len(), 3);

    let granted = t.repo.set_right(
        &lena,
        "ursula",
        RoleName::User,
        "l2",
        BTreeSet::from([metadata_right(Action::Read, EntityState::Pending)]),
    )?;
    assert!(granted.has_role(RoleName::User));

    // granting ADMIN is reserved to administrators
    assert_eq!(
        status(t.repo.set_right(&lena, "ursula", RoleName::Admin, "", BTreeSet::new())),
        Status::Forbidden
    );
    assert_eq!(status(t.repo.repository_state(&ursula)), Status::Forbidden);
    Ok(())
}

#[test]
fn users_see_themselves_and_only_admins_hand_out_roles() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    let ursula = t.plain_user("ursula")?;

    assert_eq!(t.repo.retrieve_user(&ursula, "ursula")?.name, "ursula");
    assert_eq!(status(t.repo.retrieve_user(&ursula, "root")), Status::Forbidden);

    let promoted = t.repo.set_right(
        &t.admin,
        "ursula",
        RoleName::UserAdmin,
        "",
        BTreeSet::from([RoleRight::READ, RoleRight::WRITE]),
    )?;
    let user_admin = CallerContext::authenticated(promoted);

    t.repo
        .create_user(&user_admin, User::new("victor", "victor@example.org"), "user-secret")?;
    let with_roles = User::new("wanda", "wanda@example.org")
        .with_role(RoleAssignment::new(RoleName::Admin));
    assert_eq!(
        status(t.repo.create_user(&user_admin, with_roles, "user-secret")),
        Status::Forbidden
    );

    let mut victor = t.repo.retrieve_user(&user_admin, "victor")?;
    victor.first_name = "Victor".into();
    assert_eq!(t.repo.update_user(&user_admin, victor)?.version, 2);
    t.repo.delete_user(&user_admin, "victor")?;
    assert_eq!(status(t.repo.retrieve_user(&t.admin, "victor")), Status::NotFound);
    Ok(())
}

#[test]
fn deleting_entities_drops_rights_anchored_at_them() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    t.user_with(
        "ursula",
        RoleAssignment::new(RoleName::User)
            .with_rights("l2", [metadata_right(Action::Read, EntityState::Pending)]),
    )?;

    let removed = t.repo.delete_entity(&t.admin, "l2")?;
    assert_eq!(removed, vec!["e".to_string(), "l2".to_string()]);

    let ursula = t.repo.retrieve_user(&t.admin, "ursula")?;
    assert!(!ursula.has_role(RoleName::User));
    assert!(ursula.has_role(RoleName::UserAdmin));
    Ok(())
}

#[test]
fn repository_state_counts_entities_and_users() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    t.plain_user("ursula")?;

    let state = t.repo.repository_state(&t.admin)?;
    assert_eq!(state.users, 2);
    assert_eq!(
        serde_json::to_value(&state)?,
        json!({
            "entitiesByContentModel": { "data": 1, "level1": 1, "level2": 1 },
            "users": 2
        })
    );
    Ok(())
}

#[test]
fn a_second_bootstrap_is_refused() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    let err = t
        .repo
        .bootstrap_admin(User::new("eve", "eve@example.org"), "eve-secret")
        .unwrap_err();
    assert_eq!(err.status(), Status::Conflict);
    Ok(())
}

#[test]
fn writes_are_audited_for_administrators_only() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    let writer = t.user_with(
        "walter",
        RoleAssignment::new(RoleName::User).with_rights(
            "l2",
            [
                metadata_right(Action::Write, EntityState::Pending),
                metadata_right(Action::Read, EntityState::Pending),
            ],
        ),
    )?;

    t.repo.add_relation(&writer, "e", "isPartOf", "<archivum:l2>")?;
    t.repo.submit_entity(&t.admin, "e")?;

    let records = t.repo.retrieve_audit_records(&t.admin, "e", 0, None)?;
    let trail: Vec<_> = records
        .iter()
        .map(|r| (r.action, r.agent_name.as_str()))
        .collect();
    assert_eq!(
        trail,
        vec![
            (AuditAction::SubmitEntity, "root"),
            (AuditAction::CreateRelation, "walter"),
            (AuditAction::CreateEntity, "root"),
        ]
    );

    let page = t.repo.retrieve_audit_records(&t.admin, "e", 2, Some(10))?;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].action, AuditAction::CreateEntity);

    assert_eq!(status(t.repo.retrieve_audit_records(&writer, "e", 0, None)), Status::Forbidden);
    assert_eq!(
        status(t.repo.retrieve_audit_records(&CallerContext::anonymous(), "e", 0, None)),
        Status::Unauthenticated
    );
    assert_eq!(status(t.repo.retrieve_audit_records(&t.admin, "ghost", 0, None)), Status::NotFound);
    Ok(())
}

#[test]
fn pending_writer_can_not_create_published_entities() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    let writer = t.user_with(
        "walter",
        RoleAssignment::new(RoleName::User)
            .with_rights("l2", [metadata_right(Action::Write, EntityState::Pending)]),
    )?;

    let published = Entity::new("x", "data")
        .with_parent("l2")
        .with_state(EntityState::Published);
    assert_eq!(status(t.repo.create_entity(&writer, published)), Status::Forbidden);
    assert_eq!(status(t.repo.retrieve_entity(&t.admin, "x")), Status::NotFound);

    t.repo
        .create_entity(&writer, Entity::new("x", "data").with_parent("l2"))?;
    Ok(())
}

#[test]
fn rights_at_another_level2_do_not_allow_creating_here() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    t.repo
        .create_entity(&t.admin, Entity::new("l2b", "level2").with_parent("l1"))?;
    let writer = t.user_with(
        "walter",
        RoleAssignment::new(RoleName::User)
            .with_rights("l2b", [metadata_right(Action::Write, EntityState::Pending)]),
    )?;
    let nobody = t.plain_user("nora")?;

    for caller in [&writer, &nobody] {
        assert_eq!(
            status(t.repo.create_entity(caller, Entity::new("", "data").with_parent("l2"))),
            Status::Forbidden
        );
    }
    t.repo
        .create_entity(&writer, Entity::new("", "data").with_parent("l2b"))?;
    Ok(())
}

#[test]
fn existence_is_visible_to_callers_without_read_rights() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    let nobody = t.plain_user("nora")?;

    assert_eq!(status(t.repo.retrieve_entity(&nobody, "ghost")), Status::NotFound);
    assert_eq!(status(t.repo.retrieve_entity(&nobody, "e")), Status::Forbidden);
    Ok(())
}

#[test]
fn failed_rights_cleanup_still_cleans_the_other_anchors() -> anyhow::Result<()> {
    let t = TestRepository::spawn_with(Arc::new(StuckAnchor {
        inner: InMemoryUserStore::new(),
        anchor: "l2",
    }))?;
    t.user_with(
        "lena",
        RoleAssignment::new(RoleName::Level1Admin).with_rights("l1", [RoleRight::READ]),
    )?;
    t.user_with(
        "ursula",
        RoleAssignment::new(RoleName::User)
            .with_rights("l2", [metadata_right(Action::Read, EntityState::Pending)]),
    )?;

    assert_eq!(status(t.repo.delete_entity(&t.admin, "l1")), Status::Internal);

    assert_eq!(status(t.repo.retrieve_entity(&t.admin, "l1")), Status::NotFound);
    assert!(!t.repo.retrieve_user(&t.admin, "lena")?.has_role(RoleName::Level1Admin));
    assert!(t.repo.retrieve_user(&t.admin, "ursula")?.has_role(RoleName::User));
    Ok(())
}

#[test]
fn callers_are_resolved_from_passwords() -> anyhow::Result<()> {
    let t = TestRepository::spawn()?;
    t.plain_user("ursula")?;

    let root = t.repo.authenticate("root", "root-secret")?;
    assert!(root.is_admin());
    let ursula = t.repo.authenticate("ursula", "user-secret")?;
    assert_eq!(ursula.name(), Some("ursula"));

    assert_eq!(status(t.repo.authenticate("ursula", "root-secret")), Status::Unauthenticated);
    assert_eq!(status(t.repo.authenticate("mallory", "user-secret")), Status::Unauthenticated);
    Ok(())
}
