use projdir_core::db::{open_db, open_db_in_memory};
use projdir_core::{
    Account, AccountId, AccountRepository, IdentityAllocator, InsertOutcome, NewAccount,
    ProvisionError, ProvisionRequest, RepoResult, SqliteAccountRepository, UniqueField,
};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use uuid::Uuid;

fn request(auth_id: &str, email: &str) -> ProvisionRequest {
    ProvisionRequest {
        auth_id: Some(auth_id.to_string()),
        email: Some(email.to_string()),
        ..ProvisionRequest::default()
    }
}

#[test]
fn same_email_local_part_yields_suffixed_handle() {
    let conn = open_db_in_memory().unwrap();
    let allocator = IdentityAllocator::new(SqliteAccountRepository::new(&conn));

    let first = allocator.allocate(&request("u1", "alice@x.com")).unwrap();
    let second = allocator.allocate(&request("u2", "alice@y.com")).unwrap();

    assert!(first.created);
    assert!(second.created);
    assert_eq!(first.account.handle, "alice");
    assert_eq!(second.account.handle, "alice1");
}

#[test]
fn suffixes_keep_increasing_past_taken_candidates() {
    let conn = open_db_in_memory().unwrap();
    let allocator = IdentityAllocator::new(SqliteAccountRepository::new(&conn));

    let handles: Vec<String> = (0..4)
        .map(|index| {
            allocator
                .allocate(&request(&format!("u{index}"), &format!("bob@{index}.com")))
                .unwrap()
                .account
                .handle
        })
        .collect();

    assert_eq!(handles, vec!["bob", "bob1", "bob2", "bob3"]);
}

#[test]
fn reprovisioning_known_auth_id_returns_existing_account() {
    let conn = open_db_in_memory().unwrap();
    let allocator = IdentityAllocator::new(SqliteAccountRepository::new(&conn));

    let first = allocator.allocate(&request("u1", "alice@x.com")).unwrap();
    let again = allocator
        .allocate(&ProvisionRequest {
            handle: Some("somebody-else".to_string()),
            ..request("u1", "changed@x.com")
        })
        .unwrap();

    assert!(!again.created);
    assert_eq!(again.account, first.account);

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM accounts;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn supplied_handle_takes_precedence_over_email() {
    let conn = open_db_in_memory().unwrap();
    let allocator = IdentityAllocator::new(SqliteAccountRepository::new(&conn));

    let provisioned = allocator
        .allocate(&ProvisionRequest {
            handle: Some("ally".to_string()),
            display_name: Some("Alice".to_string()),
            ..request("u1", "alice@x.com")
        })
        .unwrap();

    assert_eq!(provisioned.account.handle, "ally");
    assert_eq!(provisioned.account.display_name.as_deref(), Some("Alice"));
}

#[test]
fn missing_required_fields_fail_before_touching_store() {
    let repo = FakeAccounts::default();
    let allocator = IdentityAllocator::new(&repo);

    let err = allocator
        .allocate(&ProvisionRequest {
            email: Some("alice@x.com".to_string()),
            ..ProvisionRequest::default()
        })
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Validation(ref v) if v.field == "authId"));
    assert_eq!(repo.calls.get(), 0);
}

#[test]
fn email_derived_base_is_stripped_but_supplied_handle_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let allocator = IdentityAllocator::new(SqliteAccountRepository::new(&conn));

    let stripped = allocator.allocate(&request("u1", "a.l+ice@x.com")).unwrap();
    assert_eq!(stripped.account.handle, "a.lice");

    let err = allocator.allocate(&request("u2", "+++@x.com")).unwrap_err();
    assert!(matches!(err, ProvisionError::Validation(ref v) if v.field == "email"));

    let err = allocator
        .allocate(&ProvisionRequest {
            handle: Some("al+ice".to_string()),
            ..request("u3", "carol@x.com")
        })
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Validation(ref v) if v.field == "handle"));

    let err = allocator
        .allocate(&ProvisionRequest {
            handle: Some("a".repeat(33)),
            ..request("u4", "dave@x.com")
        })
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Validation(ref v) if v.field == "handle"));
}

#[test]
fn email_owned_by_other_subject_is_reported() {
    let conn = open_db_in_memory().unwrap();
    let allocator = IdentityAllocator::new(SqliteAccountRepository::new(&conn));

    allocator.allocate(&request("u1", "alice@x.com")).unwrap();
    let err = allocator.allocate(&request("u2", "alice@x.com")).unwrap_err();

    assert!(matches!(err, ProvisionError::EmailTaken));
}

#[test]
fn insert_conflict_after_stale_lookup_advances_to_next_suffix() {
    // The existence check always reports free, so every collision surfaces at insert.
    let repo = FakeAccounts {
        stale_lookup: true,
        ..FakeAccounts::default()
    };
    repo.seed("alice");
    repo.seed("alice1");
    let allocator = IdentityAllocator::new(&repo);

    let provisioned = allocator.allocate(&request("u9", "alice@z.com")).unwrap();

    assert_eq!(provisioned.account.handle, "alice2");
    assert_eq!(repo.conflicts.get(), 2);
}

#[test]
fn search_is_bounded_and_fails_on_exhaustion() {
    let repo = FakeAccounts {
        stale_lookup: true,
        ..FakeAccounts::default()
    };
    for attempt in 0..10 {
        repo.seed(&if attempt == 0 {
            "carol".to_string()
        } else {
            format!("carol{attempt}")
        });
    }
    let allocator = IdentityAllocator::with_max_attempts(&repo, 5);

    let err = allocator.allocate(&request("u1", "carol@x.com")).unwrap_err();

    match err {
        ProvisionError::HandleExhausted { base, attempts } => {
            assert_eq!(base, "carol");
            assert_eq!(attempts, 5);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(repo.conflicts.get(), 5);
}

#[test]
fn concurrent_auth_id_conflict_returns_winner_account() {
    let repo = FakeAccounts {
        hide_auth_lookup_once: Cell::new(true),
        ..FakeAccounts::default()
    };
    let winner = repo.seed_with_auth("dave", "u1");
    let allocator = IdentityAllocator::new(&repo);

    let provisioned = allocator.allocate(&request("u1", "dave@x.com")).unwrap();

    assert!(!provisioned.created);
    assert_eq!(provisioned.account.id, winner);
}

#[test]
fn concurrent_provisioning_never_duplicates_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.sqlite3");
    drop(open_db(&path).unwrap());

    let workers = 6;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|index| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let allocator = IdentityAllocator::new(SqliteAccountRepository::new(&conn));
                barrier.wait();
                allocator
                    .allocate(&request(&format!("u{index}"), &format!("alice@{index}.com")))
                    .unwrap()
                    .account
                    .handle
            })
        })
        .collect();

    let assigned: Vec<String> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    let unique: HashSet<&String> = assigned.iter().collect();
    assert_eq!(unique.len(), workers);

    let expected: HashSet<String> = (0..workers)
        .map(|n| {
            if n == 0 {
                "alice".to_string()
            } else {
                format!("alice{n}")
            }
        })
        .collect();
    assert_eq!(assigned.into_iter().collect::<HashSet<_>>(), expected);
}

/// In-memory account store enforcing unique handles at insert time.
#[derive(Default)]
struct FakeAccounts {
    accounts: RefCell<Vec<Account>>,
    stale_lookup: bool,
    hide_auth_lookup_once: Cell<bool>,
    calls: Cell<u32>,
    conflicts: Cell<u32>,
}

impl FakeAccounts {
    fn seed(&self, handle: &str) -> AccountId {
        self.seed_with_auth(handle, &format!("seed-{handle}"))
    }

    fn seed_with_auth(&self, handle: &str, auth_id: &str) -> AccountId {
        let account = Account {
            id: Uuid::new_v4(),
            auth_id: auth_id.to_string(),
            email: format!("{handle}@seed.test"),
            display_name: None,
            handle: handle.to_string(),
            avatar_url: None,
            role: Default::default(),
            created_at: 0,
        };
        let id = account.id;
        self.accounts.borrow_mut().push(account);
        id
    }

    fn touch(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl AccountRepository for &FakeAccounts {
    fn find_by_auth_id(&self, auth_id: &str) -> RepoResult<Option<Account>> {
        self.touch();
        if self.hide_auth_lookup_once.replace(false) {
            return Ok(None);
        }
        Ok(self
            .accounts
            .borrow()
            .iter()
            .find(|account| account.auth_id == auth_id)
            .cloned())
    }

    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>> {
        self.touch();
        Ok(self
            .accounts
            .borrow()
            .iter()
            .find(|account| account.id == id)
            .cloned())
    }

    fn handle_exists(&self, handle: &str) -> RepoResult<bool> {
        self.touch();
        if self.stale_lookup {
            return Ok(false);
        }
        Ok(self
            .accounts
            .borrow()
            .iter()
            .any(|account| account.handle == handle))
    }

    fn insert_account(&self, new: &NewAccount) -> RepoResult<InsertOutcome> {
        self.touch();
        let mut accounts = self.accounts.borrow_mut();
        let conflict = accounts.iter().find_map(|account| {
            if account.auth_id == new.auth_id {
                Some(UniqueField::AuthId)
            } else if account.handle == new.handle {
                Some(UniqueField::Handle)
            } else if account.email == new.email {
                Some(UniqueField::Email)
            } else {
                None
            }
        });
        if let Some(field) = conflict {
            self.conflicts.set(self.conflicts.get() + 1);
            return Ok(InsertOutcome::Conflict(field));
        }

        let account = Account {
            id: Uuid::new_v4(),
            auth_id: new.auth_id.clone(),
            email: new.email.clone(),
            display_name: new.display_name.clone(),
            handle: new.handle.clone(),
            avatar_url: new.avatar_url.clone(),
            role: new.role,
            created_at: 1,
        };
        accounts.push(account.clone());
        Ok(InsertOutcome::Inserted(account))
    }
}
