use tracing::{info, warn};

use crate::database::DocumentStore;
use crate::files::FileManager;
use crate::webform::{RequestContext, WebFormConfig, WebFormError};

/// Delete record `name` through `form`.
///
/// Only allowed when the form permits deletion and the caller owns the
/// record; the store's own permission check is then bypassed. A missing
/// record is reported the same way as a refused one.
pub async fn delete(
    form: &WebFormConfig,
    name: &str,
    request: &RequestContext,
    store: &dyn DocumentStore,
    files: &dyn FileManager,
) -> Result<(), WebFormError> {
    let caller = &request.caller;
    let owner = store.get_owner(&form.doc_type, name).await?;

    let is_owner = owner.as_deref().map(|o| caller.owns(o)).unwrap_or(false);
    if !(form.allow_delete && is_owner) {
        warn!(
            "Refused delete of {} {} via {} for {}",
            form.doc_type,
            name,
            form.name,
            caller.name()
        );
        return Err(WebFormError::not_allowed());
    }

    store.delete_doc(&form.doc_type, name, caller, true).await?;

    let removed = files.remove_attached(&form.doc_type, name).await?;
    info!(
        "Deleted {} {} via web form {} ({} attachments removed)",
        form.doc_type, name, form.name, removed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DocTypeMeta, Document, MemoryStore};
    use crate::files::LocalFileManager;
    use crate::types::Identity;
    use std::collections::BTreeMap;

    const DOCTYPE: &str = "ToDo";

    struct Fixture {
        store: MemoryStore,
        files: LocalFileManager,
        dir: tempfile::TempDir,
        name: String,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let mut meta = DocTypeMeta::new(DOCTYPE);
        meta.writers = vec!["admin@example.com".into()];
        store.register_doctype(meta).await;

        let mut doc = Document::new(DOCTYPE);
        doc.set_field("description", "buy milk");
        store.insert(&mut doc, &Identity::user("ann@example.com"), true).await.unwrap();
        let name = doc.name().unwrap().to_string();

        Fixture { files: LocalFileManager::new(dir.path(), "/files", 1024), store, dir, name }
    }

    fn form(allow_delete: bool) -> WebFormConfig {
        let mut form = WebFormConfig::new("todo", DOCTYPE);
        form.allow_delete = allow_delete;
        form
    }

    fn as_caller(caller: Identity) -> RequestContext {
        RequestContext::new(caller, BTreeMap::new())
    }

    #[tokio::test]
    async fn owner_can_delete_when_allowed() {
        let f = fixture().await;
        f.files.save_file("a.txt", "a", DOCTYPE, &f.name, false).await.unwrap();

        delete(&form(true), &f.name, &as_caller(Identity::user("ann@example.com")), &f.store, &f.files)
            .await
            .unwrap();

        assert_eq!(f.store.count(DOCTYPE).await, 0);
        assert!(!f.dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn every_other_combination_is_refused() {
        let cases = [
            (false, Identity::user("ann@example.com")),
            (true, Identity::user("bob@example.com")),
            // A store writer is still not the owner
            (true, Identity::user("admin@example.com")),
            (true, Identity::Guest),
            (false, Identity::Guest),
        ];

        for (allow_delete, caller) in cases {
            let f = fixture().await;
            let err = delete(&form(allow_delete), &f.name, &as_caller(caller), &f.store, &f.files).await;
            assert!(matches!(err, Err(WebFormError::Permission(ref m)) if m == "Not Allowed"));
            assert_eq!(f.store.count(DOCTYPE).await, 1);
        }
    }

    #[tokio::test]
    async fn missing_record_is_not_allowed() {
        let f = fixture().await;
        let err = delete(&form(true), "missing", &as_caller(Identity::user("ann@example.com")), &f.store, &f.files).await;
        assert!(matches!(err, Err(WebFormError::Permission(_))));
    }
}
