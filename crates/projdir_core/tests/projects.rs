use projdir_core::db::open_db_in_memory;
use projdir_core::{
    IdentityAllocator, ProjectService, ProjectServiceError, ProjectSubmission, ProvisionRequest,
    SqliteAccountRepository, SqliteProjectRepository,
};
use uuid::Uuid;

fn submission(name: &str) -> ProjectSubmission {
    ProjectSubmission {
        name: name.to_string(),
        description: Some("a directory entry".to_string()),
        url: Some("https://example.com".to_string()),
    }
}

#[test]
fn submit_then_get_returns_stored_project() {
    let conn = open_db_in_memory().unwrap();
    let account = IdentityAllocator::new(SqliteAccountRepository::new(&conn))
        .allocate(&ProvisionRequest {
            auth_id: Some("u1".to_string()),
            email: Some("alice@x.com".to_string()),
            ..ProvisionRequest::default()
        })
        .unwrap()
        .account;
    let service = ProjectService::new(SqliteProjectRepository::new(&conn));

    let created = service.submit(&submission("Ferris"), account.id).unwrap();
    let loaded = service.get(created.id).unwrap();

    assert_eq!(loaded, created);
    assert_eq!(loaded.view_count, 0);
    assert_eq!(loaded.submitted_by, Some(account.id));
}

#[test]
fn get_unknown_project_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = ProjectService::new(SqliteProjectRepository::new(&conn));
    let missing = Uuid::new_v4();

    let err = service.get(missing).unwrap_err();
    assert!(matches!(err, ProjectServiceError::NotFound(id) if id == missing));
}

#[test]
fn blank_name_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = ProjectService::new(SqliteProjectRepository::new(&conn));

    let err = service.submit(&submission("   "), Uuid::nil()).unwrap_err();
    assert!(matches!(err, ProjectServiceError::Validation(ref v) if v.field == "name"));
}

#[test]
fn list_is_newest_first_and_paginated() {
    let conn = open_db_in_memory().unwrap();
    for (index, name) in ["oldest", "middle", "newest"].iter().enumerate() {
        conn.execute(
            "INSERT INTO projects (id, name, created_at) VALUES (?1, ?2, ?3);",
            rusqlite::params![Uuid::new_v4().to_string(), name, index as i64],
        )
        .unwrap();
    }
    let service = ProjectService::new(SqliteProjectRepository::new(&conn));

    let page: Vec<String> = service
        .list(Some(2), 0)
        .unwrap()
        .into_iter()
        .map(|project| project.name)
        .collect();
    assert_eq!(page, vec!["newest", "middle"]);

    let rest = service.list(Some(2), 2).unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].name, "oldest");
}
