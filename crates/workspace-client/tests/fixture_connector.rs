use std::io::Write;

use pp_domain::config::{WorkspaceConfig, WorkspaceMode};
use pp_workspace::create_connector;

const FIXTURE: &str = r#"{
  "users": [
    {"id": "u-ada", "display_name": "Ada Lovelace", "email": "ada@studio.io"},
    {"id": "u-bo", "display_name": "Bo Chen"}
  ],
  "projects": [
    {"id": "p1", "name": "Summer Gala", "status": "Planning",
     "tasks": [{"id": "t1", "title": "Book the band"}]}
  ],
  "tags": [{"id": "tg1", "name": "events"}]
}"#;

#[tokio::test]
async fn memory_mode_loads_fixture_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FIXTURE.as_bytes()).unwrap();

    let cfg = WorkspaceConfig {
        mode: WorkspaceMode::Memory,
        fixture_path: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let connector = create_connector(&cfg).unwrap();
    assert_eq!(connector.backend(), "memory");

    let session = connector.authenticate("u-bo").await.unwrap();
    assert_eq!(session.user.display_name, "Bo Chen");

    let projects = session.store.projects_with_tasks().await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].tasks[0].title, "Book the band");
}

#[tokio::test]
async fn memory_mode_rejects_empty_token() {
    let cfg = WorkspaceConfig {
        mode: WorkspaceMode::Memory,
        ..Default::default()
    };
    let connector = create_connector(&cfg).unwrap();
    assert!(connector.authenticate("").await.is_err());
}

#[test]
fn unreadable_fixture_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = WorkspaceConfig {
        mode: WorkspaceMode::Memory,
        fixture_path: Some(dir.path().join("missing.json")),
        ..Default::default()
    };
    let err = create_connector(&cfg).err().unwrap();
    assert!(err.to_string().contains("missing.json"));
}
