//! Forwards workspace and screen notifications to the image cache actor.

use std::sync::Arc;

use objc2::rc::{Allocated, Retained};
use objc2::runtime::AnyObject;
use objc2::{AnyThread, DeclaredClass, Encode, Encoding, define_class, msg_send, sel};
use objc2_app_kit::{
    NSApplication, NSApplicationDidChangeScreenParametersNotification, NSWorkspace,
    NSWorkspaceActiveSpaceDidChangeNotification,
};
use objc2_foundation::{MainThreadMarker, NSNotification, NSNotificationCenter, NSObject};
use tracing::{info_span, trace};

use super::image_cache::{self, Event, TriggerSource};
use crate::sys::macos::MacWindowServer;

#[repr(C)]
struct Instance {
    events_tx: image_cache::Sender,
    server: Arc<MacWindowServer>,
}

unsafe impl Encode for Instance {
    const ENCODING: Encoding = Encoding::Object;
}

define_class! {
    // SAFETY:
    // - The superclass NSObject does not have any subclassing requirements.
    // - `NotificationCenterInner` does not implement `Drop`.
    #[unsafe(super(NSObject))]
    #[ivars = Box<Instance>]
    struct NotificationCenterInner;

    // SAFETY: Each of these method signatures must match their invocations.
    impl NotificationCenterInner {
        #[unsafe(method_id(initWith:))]
        fn init(this: Allocated<Self>, instance: Instance) -> Option<Retained<Self>> {
            let this = this.set_ivars(Box::new(instance));
            unsafe { msg_send![super(this), init] }
        }

        #[unsafe(method(recvActiveSpaceChanged:))]
        fn recv_active_space_changed(&self, notif: &NSNotification) {
            trace!("{notif:#?}");
            self.send_trigger(TriggerSource::ActiveSpaceChanged);
        }

        #[unsafe(method(recvScreenParametersChanged:))]
        fn recv_screen_parameters_changed(&self, notif: &NSNotification) {
            trace!("{notif:#?}");
            if let Some(mtm) = MainThreadMarker::new() {
                self.ivars().server.refresh_screens(mtm);
            }
            self.send_trigger(TriggerSource::ScreenParametersChanged);
        }
    }
}

impl NotificationCenterInner {
    fn new(events_tx: image_cache::Sender, server: Arc<MacWindowServer>) -> Retained<Self> {
        unsafe { msg_send![Self::alloc(), initWith: Instance { events_tx, server }] }
    }

    fn send_trigger(&self, source: TriggerSource) {
        let span = info_span!("notification_center::send_trigger", %source);
        let _s = span.enter();
        _ = self.ivars().events_tx.send(Event::Trigger(source));
    }
}

/// Observes notifications for as long as it is alive. Must be created on the
/// main thread, whose run loop delivers the notifications.
pub struct NotificationCenter {
    inner: Retained<NotificationCenterInner>,
}

impl NotificationCenter {
    pub fn new(
        events_tx: image_cache::Sender,
        server: Arc<MacWindowServer>,
        mtm: MainThreadMarker,
    ) -> Self {
        let handler = NotificationCenterInner::new(events_tx, server);

        let workspace = NSWorkspace::sharedWorkspace();
        let workspace_center = workspace.notificationCenter();
        let default_center = NSNotificationCenter::defaultCenter();
        let shared_app = NSApplication::sharedApplication(mtm);
        let workspace_obj: &AnyObject = &workspace;
        let app_obj: &AnyObject = &shared_app;

        // SAFETY: Both selectors take a single `&NSNotification`, and the
        // observer is removed again when `NotificationCenter` is dropped.
        unsafe {
            workspace_center.addObserver_selector_name_object(
                &handler,
                sel!(recvActiveSpaceChanged:),
                Some(NSWorkspaceActiveSpaceDidChangeNotification),
                Some(workspace_obj),
            );
            default_center.addObserver_selector_name_object(
                &handler,
                sel!(recvScreenParametersChanged:),
                Some(NSApplicationDidChangeScreenParametersNotification),
                Some(app_obj),
            );
        }

        NotificationCenter { inner: handler }
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        let workspace_center = NSWorkspace::sharedWorkspace().notificationCenter();
        // SAFETY: `inner` was registered with both centers in `new`.
        unsafe {
            workspace_center.removeObserver(&self.inner);
            NSNotificationCenter::defaultCenter().removeObserver(&self.inner);
        }
    }
}
