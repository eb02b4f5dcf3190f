//! Ready-made bar blueprints: the composition a status bar actually runs.
//!
//! Everything here is built against the abstract
//! [`Source`](filament_core::Source) contract;
//! the real compositor, mixer, tray, and player clients live behind
//! the [`Sources`] registry and publish into the shared store and bus.
//! Tests inject fakes through the same registry.
//!
//! Source names this module looks up: [`COMPOSITOR`], [`SPEAKER`],
//! [`TRAY`], [`MPRIS`], [`NOTIFICATIONS`]. A missing source degrades
//! the owning widget to an inert placeholder, with a warning; it never
//! fails the rest of the bar.

use std::time::Duration;

use tracing::warn;

use filament_core::{SourceId, Sources, Value};
use filament_reactive::{poll, EventBus, Poller, PropertyStore};
use filament_widgets::{Blueprint, Composer, WidgetKind, WidgetNode};

/// Workspace list and active window, e.g. a Wayland compositor client.
pub const COMPOSITOR: &str = "compositor";
/// Default audio output of the mixer.
pub const SPEAKER: &str = "speaker";
/// Status-notifier tray host.
pub const TRAY: &str = "tray";
/// Media player registry.
pub const MPRIS: &str = "mpris";
/// Notification daemon.
pub const NOTIFICATIONS: &str = "notifications";

/// Everything the bar's widgets share: one store, one bus, one
/// poller, and the named sources. Cloning yields handles to the same
/// underlying registries.
#[derive(Clone, Debug)]
pub struct BarContext {
    pub store: PropertyStore,
    pub bus: EventBus,
    pub poller: Poller,
    pub sources: Sources,
}

impl BarContext {
    #[must_use]
    pub fn new(sources: Sources) -> Self {
        let store = PropertyStore::new();
        let bus = EventBus::new();
        let poller = Poller::new(store.clone());
        Self {
            store,
            bus,
            poller,
            sources,
        }
    }

    #[must_use]
    pub fn composer(&self) -> Composer {
        Composer::new(self.store.clone(), self.bus.clone())
    }

    fn source_id(&self, name: &str) -> Option<SourceId> {
        let id = self.sources.get(name).map(|s| s.id());
        if id.is_none() {
            warn!(source = name, "source not registered; widget degrades to a placeholder");
        }
        id
    }

    /// Fire-and-forget command to a named source; dropped with a
    /// warning if the source is not registered.
    pub fn command(&self, source: &str, command: &str, arg: &Value) {
        match self.sources.get(source) {
            Some(src) => src.command(command, arg),
            None => warn!(source, command, "command on unregistered source dropped"),
        }
    }
}

/// Workspace switcher: one button per workspace, rebuilt wholesale
/// whenever the compositor's `workspaces` list changes. Scrolling the
/// box cycles workspaces; clicking a button jumps to it.
#[must_use]
pub fn workspaces(cx: &BarContext) -> Blueprint {
    let Some(compositor) = cx.source_id(COMPOSITOR) else {
        return Blueprint::new(WidgetKind::EventBox);
    };
    let on_click = cx.clone();
    let on_up = cx.clone();
    let on_down = cx.clone();
    Blueprint::new(WidgetKind::EventBox)
        .on("scroll_up", move |_| {
            on_up.command(COMPOSITOR, "focus_workspace_relative", &Value::Int(1));
        })
        .on("scroll_down", move |_| {
            on_down.command(COMPOSITOR, "focus_workspace_relative", &Value::Int(-1));
        })
        .children_bound(compositor, "workspaces", move |list| {
            list.as_list()
                .unwrap_or_default()
                .iter()
                .map(|ws| {
                    let id = ws.get("id").and_then(Value::as_int).unwrap_or(0);
                    let active = ws.get("active").and_then(Value::as_bool).unwrap_or(false);
                    let cx = on_click.clone();
                    Blueprint::new(WidgetKind::Button)
                        .attr("label", id.to_string())
                        .attr("active", active)
                        .on("click", move |_| {
                            cx.command(COMPOSITOR, "switch_to_workspace", &Value::Int(id));
                        })
                })
                .collect()
        })
}

/// Title of the focused window; empty when nothing is focused.
#[must_use]
pub fn client_title(cx: &BarContext) -> Blueprint {
    let Some(compositor) = cx.source_id(COMPOSITOR) else {
        return Blueprint::new(WidgetKind::Label);
    };
    Blueprint::new(WidgetKind::Label)
        .attr("max_width_chars", 40i64)
        .bind_map("label", compositor, "active_window", |window| {
            Value::Text(
                window
                    .get("title")
                    .and_then(Value::as_text)
                    .unwrap_or_default()
                    .to_owned(),
            )
        })
}

/// Summary of the most recent notification, or nothing.
#[must_use]
pub fn current_notification(cx: &BarContext) -> Blueprint {
    let Some(daemon) = cx.source_id(NOTIFICATIONS) else {
        return Blueprint::new(WidgetKind::Label);
    };
    Blueprint::new(WidgetKind::Label).bind_map("label", daemon, "notifications", |list| {
        list.as_list()
            .and_then(|items| items.first())
            .and_then(|n| n.get("summary"))
            .cloned()
            .unwrap_or(Value::Null)
    })
}

/// Clock label refreshed every `interval` by polling `render`.
///
/// `render` produces the displayed value (wall-clock formatting is the
/// caller's concern). Detaching the label cancels the poll.
#[must_use]
pub fn clock(
    cx: &BarContext,
    interval: Duration,
    render: impl Fn() -> Value + 'static,
) -> Blueprint {
    let poller = cx.poller.clone();
    let store = cx.store.clone();
    Blueprint::new(WidgetKind::Label).setup(move |node| {
        let handle = poller.schedule(interval, render);
        if let Err(err) = node.bind_attr(&store, "label", handle.source_id(), poll::OUTPUT) {
            warn!(%err, "clock label binding skipped");
        }
        node.own_poll(handle);
    })
}

/// Speaker icon tracking volume level and mute state.
#[must_use]
pub fn speaker_volume(cx: &BarContext) -> Blueprint {
    let Some(speaker) = cx.source_id(SPEAKER) else {
        return Blueprint::new(WidgetKind::Icon);
    };
    Blueprint::new(WidgetKind::Icon)
        .bind("muted", speaker, "muted")
        .bind_map("icon", speaker, "volume", |v| {
            let volume = v.as_float().unwrap_or(0.0);
            Value::Text(
                match volume {
                    v if v <= 0.0 => "audio-volume-muted",
                    v if v < 34.0 => "audio-volume-low",
                    v if v < 67.0 => "audio-volume-medium",
                    _ => "audio-volume-high",
                }
                .to_owned(),
            )
        })
}

/// Volume slider: value tracks the mixer, dragging writes back via
/// the `set_volume` command. The round trip settles because the echo
/// of an unchanged volume is suppressed by the store.
#[must_use]
pub fn speaker_slider(cx: &BarContext) -> Blueprint {
    let Some(speaker) = cx.source_id(SPEAKER) else {
        return Blueprint::new(WidgetKind::Scale);
    };
    let on_change = cx.clone();
    Blueprint::new(WidgetKind::Scale)
        .attr("min", 0i64)
        .attr("max", 100i64)
        .bind("value", speaker, "volume")
        .on("change", move |value| {
            on_change.command(SPEAKER, "set_volume", value);
        })
}

/// Media rows: one icon-plus-title row per live player. A
/// `player_added` event (payload: the player's source id) appends a
/// row whose label is bound to that player's `title`; the row removes
/// itself on the player's `closed` event.
#[must_use]
pub fn media(cx: &BarContext) -> Blueprint {
    let Some(mpris) = cx.source_id(MPRIS) else {
        return Blueprint::new(WidgetKind::Box);
    };
    let bus = cx.bus.clone();
    let composer = cx.composer();
    Blueprint::new(WidgetKind::Box).setup(move |node| {
        let parent = node.downgrade();
        let on_added = {
            let bus = bus.clone();
            move |payload: &Value| {
                let Some(player) = payload.as_source() else {
                    warn!(?payload, "player_added payload is not a source id");
                    return;
                };
                let Some(parent_node) = parent.upgrade() else {
                    return;
                };
                if parent_node.is_dead() {
                    return;
                }
                let row = composer.build(
                    Blueprint::new(WidgetKind::Box)
                        .attr("spacing", 10i64)
                        .child(
                            Blueprint::new(WidgetKind::Icon)
                                .attr("icon", "audio-x-generic-symbolic"),
                        )
                        .child(
                            Blueprint::new(WidgetKind::Label)
                                .attr("max_width_chars", 20i64)
                                .bind("label", player, "title"),
                        ),
                );
                attach_until_event(&bus, &parent_node, row, player, "closed");
            }
        };
        node.own_subscription(bus.subscribe(mpris, "player_added", on_added));
    })
}

/// Tray icons: one icon per status-notifier item, tooltip tracking
/// the item's `tooltip`. An `added` event (payload: the item's source
/// id) appends an icon bound to the item's `icon`; the icon removes
/// itself on the item's `removed` event. Clicking an icon publishes
/// `activate` on the item's channel for the tray backend to pick up.
#[must_use]
pub fn tray(cx: &BarContext) -> Blueprint {
    let Some(host) = cx.source_id(TRAY) else {
        return Blueprint::new(WidgetKind::Box);
    };
    let bus = cx.bus.clone();
    let composer = cx.composer();
    Blueprint::new(WidgetKind::Box).setup(move |node| {
        let parent = node.downgrade();
        let on_added = {
            let bus = bus.clone();
            move |payload: &Value| {
                let Some(item) = payload.as_source() else {
                    warn!(?payload, "tray added payload is not a source id");
                    return;
                };
                let Some(parent_node) = parent.upgrade() else {
                    return;
                };
                if parent_node.is_dead() {
                    return;
                }
                let click_bus = bus.clone();
                let child = composer.build(
                    Blueprint::new(WidgetKind::EventBox)
                        .bind("tooltip", item, "tooltip")
                        .on("click", move |p| click_bus.publish(item, "activate", p))
                        .child(Blueprint::new(WidgetKind::Icon).bind("icon", item, "icon")),
                );
                attach_until_event(&bus, &parent_node, child, item, "removed");
            }
        };
        node.own_subscription(bus.subscribe(host, "added", on_added));
    })
}

/// Append `child` to `parent` and make it remove itself when `owner`
/// publishes `event`. The subscription lives in the child's owned
/// set, so tearing the parent down releases it too.
fn attach_until_event(
    bus: &EventBus,
    parent: &WidgetNode,
    child: WidgetNode,
    owner: SourceId,
    event: &str,
) {
    let parent_ref = parent.downgrade();
    let child_ref = child.downgrade();
    child.own_subscription(bus.subscribe(owner, event, move |_| {
        if let (Some(p), Some(c)) = (parent_ref.upgrade(), child_ref.upgrade()) {
            p.remove_child(&c);
        }
    }));
    parent.append(child);
}

/// The whole bar: left (workspaces, window title), center
/// (notification, separator, media), right (tray, volume, clock).
#[must_use]
pub fn bar(cx: &BarContext, render_clock: impl Fn() -> Value + 'static) -> WidgetNode {
    let composer = cx.composer();
    composer.build(
        Blueprint::new(WidgetKind::BarWindow).child(
            Blueprint::new(WidgetKind::CenterBox)
                .child(
                    Blueprint::new(WidgetKind::Box)
                        .attr("spacing", 10i64)
                        .child(workspaces(cx))
                        .child(client_title(cx)),
                )
                .child(
                    Blueprint::new(WidgetKind::Box)
                        .attr("spacing", 10i64)
                        .child(current_notification(cx))
                        .child(Blueprint::new(WidgetKind::Separator).attr("vertical", true))
                        .child(media(cx)),
                )
                .child(
                    Blueprint::new(WidgetKind::Box)
                        .attr("spacing", 10i64)
                        .child(tray(cx))
                        .child(speaker_volume(cx))
                        .child(speaker_slider(cx))
                        .child(clock(cx, Duration::from_secs(1), render_clock)),
                ),
        ),
    )
}
