//! End-to-end use of the evictor the way a compositor drives it: frames are
//! produced, shown (locked) while on screen, hidden (unlocked) when their view
//! goes to the background, and evicted once too many pile up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use oxide_evictor::{
    weak_client, EvictorConfig, FrameClient, FrameEvictor, FrameRegistration, HandleCounter,
    LimitPolicy, SharedFrameEvictor, SharedHandleTracker,
};
use oxide_platform::FormFactor;

const HANDLES_PER_FRAME: usize = 4;

/// A view's current frame, holding shared memory until evicted.
struct ViewFrame {
    resident: AtomicBool,
    handles: Arc<SharedHandleTracker>,
}

impl ViewFrame {
    fn new(handles: &Arc<SharedHandleTracker>) -> Arc<Self> {
        handles.record_allocation(HANDLES_PER_FRAME);
        Arc::new(Self {
            resident: AtomicBool::new(true),
            handles: Arc::clone(handles),
        })
    }

    fn is_resident(&self) -> bool {
        self.resident.load(Ordering::Relaxed)
    }
}

impl FrameClient for ViewFrame {
    fn evict_current_frame(&self) {
        if self.resident.swap(false, Ordering::Relaxed) {
            self.handles.record_release(HANDLES_PER_FRAME);
        }
    }
}

struct View {
    frame: Arc<ViewFrame>,
    registration: FrameRegistration,
}

fn open_view(evictor: &SharedFrameEvictor, handles: &Arc<SharedHandleTracker>) -> View {
    let frame = ViewFrame::new(handles);
    // Views open in the foreground
    let registration = evictor.register(weak_client(&frame), true);
    View {
        frame,
        registration,
    }
}

fn desktop_config(memory_mb: u64) -> EvictorConfig {
    EvictorConfig::default()
        .with_form_factor(FormFactor::Desktop)
        .with_physical_memory_mb(memory_mb)
        .with_handle_limit(1024)
}

#[test]
fn test_background_tabs_are_evicted_oldest_first() {
    let handles = Arc::new(SharedHandleTracker::new());
    // 512 MiB desktop: four frames
    let evictor = SharedFrameEvictor::new(FrameEvictor::from_config(
        &desktop_config(512),
        handles.clone(),
    ));
    assert_eq!(evictor.stats().max_frames, 4);

    let views: Vec<View> = (0..6).map(|_| open_view(&evictor, &handles)).collect();
    // Everything is on screen, nothing can go
    assert_eq!(evictor.stats().tracked_frames(), 6);
    assert!(views.iter().all(|v| v.frame.is_resident()));

    // Send views to the background in order
    for view in &views {
        view.registration.unlock().unwrap();
    }

    // Six tracked, budget four: the first two backgrounded views lose frames
    let resident: Vec<bool> = views.iter().map(|v| v.frame.is_resident()).collect();
    assert_eq!(resident, vec![false, false, true, true, true, true]);
    assert_eq!(handles.allocated_handle_count(), 4 * HANDLES_PER_FRAME);
    assert_eq!(evictor.stats().evictions, 2);
}

#[test]
fn test_refocused_view_is_protected() {
    let handles = Arc::new(SharedHandleTracker::new());
    let config = desktop_config(0).with_max_frames(2);
    let evictor = SharedFrameEvictor::new(FrameEvictor::from_config(&config, handles.clone()));

    let a = open_view(&evictor, &handles);
    let b = open_view(&evictor, &handles);
    a.registration.unlock().unwrap();
    b.registration.unlock().unwrap();

    // a comes back to the foreground before a third view opens
    a.registration.lock().unwrap();
    let c = open_view(&evictor, &handles);

    assert!(a.frame.is_resident());
    assert!(!b.frame.is_resident());
    assert!(c.frame.is_resident());
}

#[test]
fn test_closing_view_frees_budget() {
    let handles = Arc::new(SharedHandleTracker::new());
    let config = desktop_config(0).with_max_frames(2);
    let evictor = SharedFrameEvictor::new(FrameEvictor::from_config(&config, handles.clone()));

    let a = open_view(&evictor, &handles);
    let b = open_view(&evictor, &handles);
    b.registration.unlock().unwrap();

    drop(a);
    let c = open_view(&evictor, &handles);

    // Closing a made room, so b survives c opening
    assert!(b.frame.is_resident());
    assert!(c.frame.is_resident());
    assert_eq!(evictor.stats().tracked_frames(), 2);
}

#[test]
fn test_phone_keeps_a_single_frame() {
    let handles = Arc::new(SharedHandleTracker::new());
    let config = EvictorConfig::default()
        .with_form_factor(FormFactor::Phone)
        .with_handle_limit(1024);
    let mut evictor = FrameEvictor::from_config(&config, handles.clone());

    let first = ViewFrame::new(&handles);
    let second = ViewFrame::new(&handles);
    let first_id = oxide_evictor::FrameId::next();
    let second_id = oxide_evictor::FrameId::next();

    evictor.add_frame(first_id, weak_client(&first), false);
    evictor.add_frame(second_id, weak_client(&second), false);

    assert!(!first.is_resident());
    assert!(second.is_resident());
    assert_eq!(
        evictor.unlocked_frames().collect::<Vec<_>>(),
        vec![second_id]
    );
}

#[test]
fn test_custom_policy_handle_budget() {
    let handles = Arc::new(SharedHandleTracker::new());
    let policy = LimitPolicy {
        handles_per_frame: 128.0,
        ..LimitPolicy::default()
    };
    // 1024 / 128 = 8 handles, i.e. two frames' worth
    let config = desktop_config(16 * 1024).with_policy(policy);
    let evictor = SharedFrameEvictor::new(FrameEvictor::from_config(&config, handles.clone()));
    assert_eq!(evictor.stats().max_handles, 2 * HANDLES_PER_FRAME);

    let views: Vec<View> = (0..3).map(|_| open_view(&evictor, &handles)).collect();
    for view in &views {
        view.registration.unlock().unwrap();
    }

    let resident: Vec<bool> = views.iter().map(|v| v.frame.is_resident()).collect();
    assert_eq!(resident, vec![false, true, true]);
    assert!(handles.allocated_handle_count() <= 2 * HANDLES_PER_FRAME);
}
