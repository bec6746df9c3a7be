//! Live list and search behavior of the People view.

use std::sync::Arc;
use std::time::Duration;

use b2b_core::{CustomerFields, CustomerStore, IdentityProvider, OwnerId, SessionHandle};
use b2b_db::MemoryCustomerStore;
use b2b_people::PeopleView;

fn owner(id: &str) -> OwnerId {
    OwnerId::new(id).unwrap()
}

fn fields(first: &str, last: &str, email: &str) -> CustomerFields {
    CustomerFields {
        first_name: first.into(),
        last_name: last.into(),
        email: email.into(),
        ..Default::default()
    }
}

async fn wait_for(view: &mut PeopleView, len: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while view.records().len() != len {
            assert!(view.next_update().await, "feed ended early");
        }
    })
    .await
    .expect("timed out waiting for records");
}

fn view_for(store: &Arc<MemoryCustomerStore>, session: &SessionHandle) -> PeopleView {
    PeopleView::new(
        store.clone(),
        Arc::new(session.clone()) as Arc<dyn IdentityProvider>,
    )
}

#[tokio::test]
async fn test_search_lee_matches_case_insensitively() {
    let store = Arc::new(MemoryCustomerStore::new());
    let me = owner("owner-1");
    store.create(&me, fields("Ann", "Lee", ""), vec![]).await.unwrap();
    store
        .create(&me, fields("Bob", "Smith", "bob@leeway.com"), vec![])
        .await
        .unwrap();
    store.create(&me, fields("Cy", "Young", ""), vec![]).await.unwrap();

    let session = SessionHandle::signed_in(me);
    let mut view = view_for(&store, &session);
    view.sync_owner().await;
    wait_for(&mut view, 3).await;

    view.set_query("lee");
    let shown = view.visible();
    let names: Vec<String> = shown.iter().map(|c| c.fields.display_name()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Ann Lee".to_string()));
    assert!(names.contains(&"Bob Smith".to_string()));

    view.set_query("  ");
    assert_eq!(view.visible().len(), 3);
    view.close().await;
}

#[tokio::test]
async fn test_search_lee_returns_only_ann_lee() {
    let store = Arc::new(MemoryCustomerStore::new());
    let me = owner("owner-1");
    store.create(&me, fields("Ann", "Lee", ""), vec![]).await.unwrap();
    store.create(&me, fields("Bob", "Kim", ""), vec![]).await.unwrap();

    let session = SessionHandle::signed_in(me);
    let mut view = view_for(&store, &session);
    view.sync_owner().await;
    wait_for(&mut view, 2).await;

    view.set_query("lee");
    let shown = view.visible();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].fields.first_name, "Ann");
    view.close().await;
}

#[tokio::test]
async fn test_visible_is_memoized_until_inputs_change() {
    let store = Arc::new(MemoryCustomerStore::new());
    let me = owner("owner-1");
    store.create(&me, fields("Ann", "Lee", ""), vec![]).await.unwrap();

    let session = SessionHandle::signed_in(me.clone());
    let mut view = view_for(&store, &session);
    view.sync_owner().await;
    wait_for(&mut view, 1).await;
    view.set_query("ann");

    let first = view.visible();
    let second = view.visible();
    assert!(Arc::ptr_eq(&first, &second));

    view.set_query("lee");
    let third = view.visible();
    assert!(!Arc::ptr_eq(&second, &third));

    store.create(&me, fields("Al", "Leeds", ""), vec![]).await.unwrap();
    wait_for(&mut view, 2).await;
    let fourth = view.visible();
    assert!(!Arc::ptr_eq(&third, &fourth));
    assert_eq!(fourth.len(), 2);
    view.close().await;
}

#[tokio::test]
async fn test_owner_change_switches_feed() {
    let store = Arc::new(MemoryCustomerStore::new());
    let alice = owner("alice");
    let bob = owner("bob");
    store.create(&alice, fields("A", "One", ""), vec![]).await.unwrap();
    store.create(&bob, fields("B", "One", ""), vec![]).await.unwrap();
    store.create(&bob, fields("B", "Two", ""), vec![]).await.unwrap();

    let session = SessionHandle::signed_in(alice.clone());
    let mut view = view_for(&store, &session);
    view.sync_owner().await;
    wait_for(&mut view, 1).await;
    assert_eq!(view.owner(), Some(&alice));

    session.sign_in(bob.clone());
    view.sync_owner().await;
    assert_eq!(view.owner(), Some(&bob));
    wait_for(&mut view, 2).await;
    assert!(view.records().iter().all(|c| c.owner == bob));

    // Alice's writes no longer reach this view.
    store.create(&alice, fields("A", "Two", ""), vec![]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    view.refresh();
    assert_eq!(view.records().len(), 2);

    session.sign_out();
    view.sync_owner().await;
    assert_eq!(view.owner(), None);
    assert!(view.records().is_empty());
    assert!(!view.next_update().await);
}

#[tokio::test]
async fn test_settling_session_does_not_subscribe() {
    let store = Arc::new(MemoryCustomerStore::new());
    let session = SessionHandle::new();
    let mut view = view_for(&store, &session);

    view.sync_owner().await;
    assert_eq!(view.owner(), None);

    session.sign_in(owner("owner-1"));
    view.sync_owner().await;
    assert_eq!(view.owner(), Some(&owner("owner-1")));
    view.close().await;
}

#[tokio::test]
async fn test_delete_removes_from_view() {
    let store = Arc::new(MemoryCustomerStore::new());
    let me = owner("owner-1");
    let id = store.create(&me, fields("Ann", "Lee", ""), vec![]).await.unwrap();
    store.create(&me, fields("Bo", "Ng", ""), vec![]).await.unwrap();

    let session = SessionHandle::signed_in(me.clone());
    let mut view = view_for(&store, &session);
    view.sync_owner().await;
    wait_for(&mut view, 2).await;

    store.delete(&me, id).await.unwrap();
    wait_for(&mut view, 1).await;
    assert!(view.records().iter().all(|c| c.id != id));
    view.close().await;
}
