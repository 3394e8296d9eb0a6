mod common;

use std::sync::Arc;

use common::{GatedFetcher, RecordingFetcher, WAIT, browser, media_server};
use pmobrowse::{
    BrowseError, Descriptor, DeviceDiscovery, DeviceId, ManualDiscovery, MediaDevice, Navigation,
    NodePath, NodeStatus, SortSpec, TreeInvalidation, TreeQuery,
};

fn server_x_listing() -> Vec<Descriptor> {
    vec![
        Descriptor::container("1", "Movies"),
        Descriptor::leaf("2", "a.mp4", Some("http://x/2")),
    ]
}

#[test]
fn test_end_to_end_browse_and_open() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let fetcher = Arc::new(RecordingFetcher::new(true).with_listing("0", server_x_listing()));
    let mut browser = browser(&discovery, fetcher.clone());

    assert_eq!(browser.root_count(), 1);
    let server = browser.root_child(0).unwrap();
    assert_eq!(browser.display_label(&server), Some("ServerX"));
    assert_eq!(browser.child_count(&server), 0);

    let navigation = browser.navigate_into(&server).unwrap();
    assert!(matches!(navigation, Navigation::Started { .. }));
    assert_eq!(browser.child_count(&server), 0);
    assert_eq!(browser.node_status(&server), Some(NodeStatus::Loading));

    assert!(browser.wait_for_completion(WAIT));

    assert_eq!(browser.child_count(&server), 2);
    let movies = browser.child(&server, 0).unwrap();
    let clip = browser.child(&server, 1).unwrap();
    assert_eq!(browser.display_label(&movies), Some("Movies"));
    assert!(!browser.is_leaf(&movies));
    assert!(browser.is_leaf(&clip));
    assert_eq!(browser.tree().node(&movies).unwrap().depth(), 1);

    browser.on_selection_changed(&[clip]);
    assert!(browser.has_playable_selection());
    let opened: Vec<String> = browser
        .open_selection()
        .unwrap()
        .iter()
        .map(|url| url.to_string())
        .collect();
    assert_eq!(opened, vec!["http://x/2".to_string()]);

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].object_id, "0");
    assert_eq!(calls[0].sort, SortSpec::title());
}

#[test]
fn test_sort_negotiation_without_title_sort() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let fetcher = Arc::new(
        RecordingFetcher::new(false)
            .with_listing("0", server_x_listing())
            .with_listing("1", vec![Descriptor::leaf("1$1", "b.mkv", Some("http://x/3"))]),
    );
    let mut browser = browser(&discovery, fetcher.clone());
    let server = NodePath::device(0);

    browser.navigate_into(&server).unwrap();
    assert!(browser.wait_for_completion(WAIT));
    browser.navigate_into(&server.child(0)).unwrap();
    assert!(browser.wait_for_completion(WAIT));

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|call| call.sort == SortSpec::Unsorted));
    assert_eq!(calls[1].object_id, "1");
    assert_eq!(fetcher.sort_queries(), 1);
    assert_eq!(browser.child_count(&server.child(0)), 1);
    assert_eq!(browser.tree().node(&server.child(0).child(0)).unwrap().depth(), 2);
}

#[test]
fn test_failing_sort_capabilities_fall_back_to_unsorted() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let fetcher = Arc::new(
        RecordingFetcher::new(true)
            .with_sort_caps_failure(BrowseError::fetch_failed("0", "GetSortCapabilities: 401"))
            .with_listing("0", server_x_listing()),
    );
    let mut browser = browser(&discovery, fetcher.clone());
    let server = NodePath::device(0);

    browser.navigate_into(&server).unwrap();
    assert!(browser.wait_for_completion(WAIT));

    assert_eq!(fetcher.sort_queries(), 1);
    let calls = fetcher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].sort, SortSpec::Unsorted);
    assert_eq!(browser.node_status(&server), Some(NodeStatus::Populated(2)));
    assert!(browser.node_error(&server).is_none());
    assert!(!browser.tree().node(&server).unwrap().as_device().unwrap().title_sort());

    browser.navigate_into(&server.child(0)).unwrap();
    assert!(browser.wait_for_completion(WAIT));
    assert_eq!(fetcher.calls()[1].sort, SortSpec::Unsorted);
}

#[test]
fn test_container_navigation_reuses_title_sort() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let fetcher = Arc::new(RecordingFetcher::new(true).with_listing("0", server_x_listing()));
    let mut browser = browser(&discovery, fetcher.clone());
    let server = NodePath::device(0);

    browser.navigate_into(&server).unwrap();
    assert!(browser.wait_for_completion(WAIT));
    assert!(browser.tree().node(&server).unwrap().as_device().unwrap().title_sort());

    browser.navigate_into(&server.child(0)).unwrap();
    assert!(browser.wait_for_completion(WAIT));

    let calls = fetcher.calls();
    assert_eq!(calls[1].sort.as_criteria(), "+dc:title");
    assert_eq!(fetcher.sort_queries(), 1);
    // Movies is confirmed empty, not unknown
    assert_eq!(browser.node_status(&server.child(0)), Some(NodeStatus::Empty));
}

#[test]
fn test_renavigation_discards_known_children() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let fetcher = Arc::new(
        RecordingFetcher::new(true)
            .with_listing("0", server_x_listing())
            .with_listing(
                "1",
                vec![
                    Descriptor::leaf("1$1", "one", Some("http://x/1")),
                    Descriptor::leaf("1$2", "two", Some("http://x/2")),
                ],
            ),
    );
    let mut browser = browser(&discovery, fetcher.clone());
    let server = NodePath::device(0);
    browser.navigate_into(&server).unwrap();
    assert!(browser.wait_for_completion(WAIT));
    let movies = server.child(0);
    browser.navigate_into(&movies).unwrap();
    assert!(browser.wait_for_completion(WAIT));
    assert_eq!(browser.child_count(&movies), 2);

    browser.navigate_into(&movies).unwrap();

    assert_eq!(browser.child_count(&movies), 0);
    assert!(browser.child(&movies, 0).is_err());
    assert!(browser.wait_for_completion(WAIT));
    assert_eq!(browser.child_count(&movies), 2);
    assert_eq!(fetcher.calls().len(), 3);
}

#[test]
fn test_stale_completion_is_discarded() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let (fetcher, pending) = GatedFetcher::new();
    let mut browser = browser(&discovery, Arc::new(fetcher));
    let server = NodePath::device(0);

    browser.navigate_into(&server).unwrap();
    pending
        .recv_timeout(WAIT)
        .unwrap()
        .reply(Ok(vec![Descriptor::container("1", "Movies")]));
    assert!(browser.wait_for_completion(WAIT));

    let movies = server.child(0);
    let Navigation::Started { generation: first } = browser.navigate_into(&movies).unwrap() else {
        panic!("first navigation did not start a fetch");
    };
    let first_call = pending.recv_timeout(WAIT).unwrap();
    let Navigation::Started { generation: second } = browser.navigate_into(&movies).unwrap() else {
        panic!("second navigation did not start a fetch");
    };
    let second_call = pending.recv_timeout(WAIT).unwrap();
    assert!(second > first);

    second_call.reply(Ok(vec![Descriptor::leaf("1$9", "second", Some("http://x/9"))]));
    assert!(browser.wait_for_completion(WAIT));
    assert_eq!(browser.child_count(&movies), 1);

    first_call.reply(Ok(vec![
        Descriptor::leaf("1$1", "first", Some("http://x/1")),
        Descriptor::leaf("1$2", "other", Some("http://x/2")),
    ]));
    assert!(browser.wait_for_completion(WAIT));

    assert_eq!(browser.child_count(&movies), 1);
    assert_eq!(browser.display_label(&movies.child(0)), Some("second"));
}

#[test]
fn test_device_switch_tears_down_previous_subtree() {
    let discovery = Arc::new(ManualDiscovery::with_devices([
        media_server("uuid:a", "NAS"),
        media_server("uuid:b", "Laptop"),
    ]));
    let fetcher = Arc::new(RecordingFetcher::new(false).with_listing("0", server_x_listing()));
    let mut browser = browser(&discovery, fetcher.clone());
    let nas = NodePath::device(0);
    let laptop = NodePath::device(1);

    browser.navigate_into(&nas).unwrap();
    assert!(browser.wait_for_completion(WAIT));
    assert_eq!(browser.child_count(&nas), 2);
    assert_eq!(browser.navigate_into(&nas).unwrap(), Navigation::AlreadyExpanded);

    browser.navigate_into(&laptop).unwrap();

    assert_eq!(browser.child_count(&nas), 0);
    assert_eq!(browser.node_status(&nas), Some(NodeStatus::Unexplored));
    assert_eq!(browser.expanded_device(), Some(&DeviceId("uuid:b".into())));
    assert!(browser.wait_for_completion(WAIT));
    assert_eq!(browser.child_count(&laptop), 2);
    assert_eq!(browser.child_count(&nas), 0);
    assert_eq!(fetcher.calls().len(), 2);
}

#[test]
fn test_result_for_collapsed_device_is_dropped() {
    let discovery = Arc::new(ManualDiscovery::with_devices([
        media_server("uuid:a", "NAS"),
        media_server("uuid:b", "Laptop"),
    ]));
    let (fetcher, pending) = GatedFetcher::new();
    let mut browser = browser(&discovery, Arc::new(fetcher));

    browser.navigate_into(&NodePath::device(0)).unwrap();
    let nas_call = pending.recv_timeout(WAIT).unwrap();
    browser.navigate_into(&NodePath::device(1)).unwrap();
    let laptop_call = pending.recv_timeout(WAIT).unwrap();

    nas_call.reply(Ok(server_x_listing()));
    assert!(browser.wait_for_completion(WAIT));
    assert_eq!(browser.child_count(&NodePath::device(0)), 0);
    assert_eq!(browser.node_status(&NodePath::device(0)), Some(NodeStatus::Unexplored));

    laptop_call.reply(Ok(vec![Descriptor::container("7", "Photos")]));
    assert!(browser.wait_for_completion(WAIT));
    assert_eq!(browser.child_count(&NodePath::device(1)), 1);
}

#[test]
fn test_completion_follows_device_after_reorder() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:a", "NAS")]));
    let (fetcher, pending) = GatedFetcher::new();
    let mut browser = browser(&discovery, Arc::new(fetcher));

    browser.navigate_into(&NodePath::device(0)).unwrap();
    let call = pending.recv_timeout(WAIT).unwrap();

    discovery.set_devices(vec![media_server("uuid:c", "Phone"), media_server("uuid:a", "NAS")]);
    assert!(browser.process_pending() >= 1);
    assert_eq!(browser.display_label(&NodePath::device(1)), Some("NAS"));
    assert_eq!(browser.node_status(&NodePath::device(1)), Some(NodeStatus::Loading));

    call.reply(Ok(server_x_listing()));
    assert!(browser.wait_for_completion(WAIT));
    assert_eq!(browser.child_count(&NodePath::device(1)), 2);
    assert_eq!(browser.child_count(&NodePath::device(0)), 0);
}

#[test]
fn test_failed_browse_is_scoped_to_node() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let failure = BrowseError::fetch_failed("1", "HTTP error when sending Browse");
    let fetcher = Arc::new(
        RecordingFetcher::new(true)
            .with_listing("0", server_x_listing())
            .with_failure("1", failure.clone()),
    );
    let mut browser = browser(&discovery, fetcher);
    let server = NodePath::device(0);
    browser.navigate_into(&server).unwrap();
    assert!(browser.wait_for_completion(WAIT));

    let movies = server.child(0);
    browser.navigate_into(&movies).unwrap();
    assert!(browser.wait_for_completion(WAIT));

    assert_eq!(browser.node_status(&movies), Some(NodeStatus::Failed));
    assert_eq!(browser.child_count(&movies), 0);
    assert_eq!(browser.node_error(&movies), Some(&failure));
    // Le reste de l'arbre est intact
    assert_eq!(browser.child_count(&server), 2);
    assert_eq!(browser.node_status(&server), Some(NodeStatus::Populated(2)));
}

#[test]
fn test_malformed_descriptor_fails_the_listing() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let fetcher = Arc::new(RecordingFetcher::new(true).with_listing(
        "0",
        vec![
            Descriptor::container("1", "Movies"),
            Descriptor::leaf("2", "", Some("http://x/2")),
        ],
    ));
    let mut browser = browser(&discovery, fetcher);
    let server = NodePath::device(0);

    browser.navigate_into(&server).unwrap();
    assert!(browser.wait_for_completion(WAIT));

    assert_eq!(browser.node_status(&server), Some(NodeStatus::Failed));
    assert_eq!(browser.child_count(&server), 0);
    assert!(matches!(
        browser.node_error(&server),
        Some(BrowseError::MalformedDescriptor { object_id, .. }) if object_id == "0"
    ));
}

#[test]
fn test_navigation_preconditions() {
    let bare = MediaDevice::new("uuid:bare", "Bare", pmobrowse::MEDIA_SERVER_URN);
    let discovery = Arc::new(ManualDiscovery::with_devices([
        media_server("uuid:x", "ServerX"),
        bare,
    ]));
    let fetcher = Arc::new(RecordingFetcher::new(true).with_listing("0", server_x_listing()));
    let mut browser = browser(&discovery, fetcher.clone());

    assert!(matches!(
        browser.navigate_into(&NodePath::device(1)),
        Err(BrowseError::NotBrowsable(name)) if name == "Bare"
    ));
    assert_eq!(browser.node_status(&NodePath::device(1)), Some(NodeStatus::Unexplored));
    assert!(matches!(
        browser.navigate_into(&NodePath::device(5)),
        Err(BrowseError::UnknownNode(_))
    ));

    browser.navigate_into(&NodePath::device(0)).unwrap();
    assert!(browser.wait_for_completion(WAIT));
    let clip = NodePath::device(0).child(1);
    assert!(matches!(
        browser.navigate_into(&clip),
        Err(BrowseError::NotNavigable(_))
    ));

    browser.on_selection_changed(&[clip.clone()]);
    assert!(browser.has_playable_selection());
    assert_eq!(browser.on_user_navigate(&clip).unwrap(), Navigation::Ignored);
    assert!(!browser.has_playable_selection());
    assert_eq!(fetcher.calls().len(), 1);
}

#[test]
fn test_open_selection_requires_a_leaf() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let fetcher = Arc::new(RecordingFetcher::new(true).with_listing("0", server_x_listing()));
    let mut browser = browser(&discovery, fetcher);
    let server = NodePath::device(0);
    browser.navigate_into(&server).unwrap();
    assert!(browser.wait_for_completion(WAIT));

    browser.on_selection_changed(&[server.child(0), server.clone()]);

    assert!(!browser.has_playable_selection());
    assert!(browser.playable_locators().is_empty());
    assert_eq!(browser.open_selection(), Err(BrowseError::NoPlayableSelection));
}

#[test]
fn test_user_navigation_clears_selection() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let fetcher = Arc::new(RecordingFetcher::new(true).with_listing("0", server_x_listing()));
    let mut browser = browser(&discovery, fetcher);
    let server = NodePath::device(0);
    browser.navigate_into(&server).unwrap();
    assert!(browser.wait_for_completion(WAIT));

    browser.on_selection_changed(&[server.child(1)]);
    assert!(browser.has_playable_selection());

    let navigation = browser.on_user_navigate(&server.child(0)).unwrap();

    assert!(matches!(navigation, Navigation::Started { .. }));
    assert!(!browser.has_playable_selection());
}

#[test]
fn test_invalidations_follow_loading_and_install() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:x", "ServerX")]));
    let fetcher = Arc::new(RecordingFetcher::new(true).with_listing("0", server_x_listing()));
    let mut browser = browser(&discovery, fetcher);
    let invalidations = browser.subscribe_invalidations();
    let server = NodePath::device(0);

    browser.navigate_into(&server).unwrap();
    assert!(browser.wait_for_completion(WAIT));

    let expected = TreeInvalidation::Children {
        parent: server.clone(),
        level: 1,
    };
    let events: Vec<TreeInvalidation> = invalidations.try_iter().collect();
    assert_eq!(events, vec![expected.clone(), expected]);
}

#[test]
fn test_discovery_changes_update_root_level() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:a", "NAS")]));
    let fetcher = Arc::new(RecordingFetcher::new(true).with_listing("0", server_x_listing()));
    let mut browser = browser(&discovery, fetcher);
    let invalidations = browser.subscribe_invalidations();

    discovery.add_device(media_server("uuid:b", "Laptop"));
    discovery.add_device(MediaDevice::new(
        "uuid:r",
        "Speaker",
        "urn:schemas-upnp-org:device:MediaRenderer:1",
    ));
    assert_eq!(browser.root_count(), 1);

    assert_eq!(browser.process_pending(), 1);
    assert_eq!(browser.root_count(), 2);
    assert_eq!(browser.display_label(&NodePath::device(1)), Some("Laptop"));
    assert_eq!(invalidations.try_recv(), Ok(TreeInvalidation::Roots));
}

#[test]
fn test_vanished_expanded_device_is_torn_down() {
    let discovery = Arc::new(ManualDiscovery::with_devices([
        media_server("uuid:a", "NAS"),
        media_server("uuid:b", "Laptop"),
    ]));
    let fetcher = Arc::new(RecordingFetcher::new(true).with_listing("0", server_x_listing()));
    let mut browser = browser(&discovery, fetcher);

    browser.navigate_into(&NodePath::device(1)).unwrap();
    assert!(browser.wait_for_completion(WAIT));
    browser.on_selection_changed(&[NodePath::device(1).child(1)]);
    assert!(browser.has_playable_selection());

    discovery.remove_device(&DeviceId("uuid:b".into()));
    browser.process_pending();

    assert_eq!(browser.root_count(), 1);
    assert_eq!(browser.expanded_device(), None);
    assert!(!browser.has_playable_selection());
    assert_eq!(browser.child_count(&NodePath::device(0)), 0);
}

#[test]
fn test_empty_discovery_is_an_empty_root() {
    let discovery = Arc::new(ManualDiscovery::new());
    let browser = browser(&discovery, Arc::new(RecordingFetcher::new(false)));

    assert_eq!(browser.root_count(), 0);
    assert!(matches!(
        browser.root_child(0),
        Err(BrowseError::IndexOutOfRange { index: 0, count: 0 })
    ));
}

#[test]
fn test_close_and_drop_unsubscribe() {
    let discovery = Arc::new(ManualDiscovery::with_devices([media_server("uuid:a", "NAS")]));
    let fetcher = Arc::new(RecordingFetcher::new(true));

    let mut first = browser(&discovery, fetcher.clone());
    let second = browser(&discovery, fetcher);
    assert_eq!(discovery.subscriber_count(), 2);

    first.close();
    assert!(!first.is_open());
    assert_eq!(first.root_count(), 0);
    assert_eq!(discovery.subscriber_count(), 1);

    drop(second);
    assert_eq!(discovery.subscriber_count(), 0);

    first.open();
    assert_eq!(first.root_count(), 1);
    assert_eq!(discovery.root_devices().len(), 1);
}
