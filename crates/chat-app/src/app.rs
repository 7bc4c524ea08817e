use std::path::PathBuf;
use std::time::Duration;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::notification::{Notification, NotificationList};
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use crate::chat::view::service_setup_notice;
use crate::chat::{ChatView, HistorySidebar};

pub fn default_themes_path() -> PathBuf {
    PathBuf::from("./themes")
}

pub const SIDEBAR_DEFAULT_WIDTH: f32 = 260.0;
pub const SIDEBAR_MIN_WIDTH: f32 = 200.0;
pub const SIDEBAR_MAX_WIDTH: f32 = 400.0;
const SIDEBAR_ANIMATION_DURATION: Duration = Duration::from_millis(150);
const HEADER_HEIGHT: f32 = 44.0;

const _: () = {
    assert!(SIDEBAR_MIN_WIDTH < SIDEBAR_DEFAULT_WIDTH);
    assert!(SIDEBAR_DEFAULT_WIDTH < SIDEBAR_MAX_WIDTH);
    assert!(SIDEBAR_MIN_WIDTH > 0.0);
};

/// Clamps a drag position to [`SIDEBAR_MIN_WIDTH`, `SIDEBAR_MAX_WIDTH`].
pub fn compute_sidebar_width(drag_x: f32) -> f32 {
    drag_x.clamp(SIDEBAR_MIN_WIDTH, SIDEBAR_MAX_WIDTH)
}

/// Start and end widths of the sidebar animation for the current toggle.
///
/// Before the first toggle nothing animates.
fn sidebar_animation_span(visible: bool, toggles: usize, expanded_width: f32) -> (f32, f32) {
    match (visible, toggles) {
        (false, 0) => (0.0, 0.0),
        (true, 0) => (expanded_width, expanded_width),
        (true, _) => (0.0, expanded_width),
        (false, _) => (expanded_width, 0.0),
    }
}

gpui::actions!(shell, [NewChat, ToggleSidebar, Quit,]);

#[derive(Clone)]
struct SidebarResizeDrag;

/// Invisible drag preview; only the cursor changes while resizing.
struct EmptyDragView;

impl Render for EmptyDragView {
    fn render(&mut self, _: &mut Window, _: &mut Context<Self>) -> impl IntoElement {
        div()
    }
}

/// Root layout: header bar, collapsible history sidebar and the chat view.
pub struct ChatAppShell {
    notification_list: Entity<NotificationList>,
    chat_view: Entity<ChatView>,
    sidebar_width: f32,
    /// Bumped on every toggle so the width animation restarts.
    animation_trigger: usize,
}

impl ChatAppShell {
    pub fn new(
        notification_list: Entity<NotificationList>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let chat_view = cx.new(|cx| ChatView::new(window, cx));

        let notice = chat_view.read(cx).service_error().map(service_setup_notice);
        if let Some(notice) = notice {
            notification_list.update(cx, |list, cx| {
                list.push(Notification::error(notice), window, cx);
            });
        }

        Self {
            notification_list,
            chat_view,
            sidebar_width: SIDEBAR_DEFAULT_WIDTH,
            animation_trigger: 0,
        }
    }

    fn toggle_sidebar(&mut self, cx: &mut Context<Self>) {
        let visible = self
            .chat_view
            .update(cx, |chat_view, cx| chat_view.toggle_sidebar(cx));
        self.animation_trigger += 1;
        tracing::debug!(visible, "sidebar toggled");
        cx.notify();
    }

    fn resize_sidebar(&mut self, new_width: f32, cx: &mut Context<Self>) {
        self.sidebar_width = compute_sidebar_width(new_width);
        cx.notify();
    }

    fn new_chat(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.chat_view
            .update(cx, |chat_view, cx| chat_view.new_chat(window, cx));
    }

    fn render_header(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        h_flex()
            .id("app-header")
            .w_full()
            .h(px(HEADER_HEIGHT))
            .flex_shrink_0()
            .pl(px(80.)) // clears the macOS traffic lights
            .pr_4()
            .gap_2()
            .items_center()
            .border_b_1()
            .border_color(theme.border)
            .bg(theme.background)
            .child(
                Button::new("toggle-sidebar")
                    .ghost()
                    .small()
                    .icon(IconName::PanelLeft)
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.toggle_sidebar(cx);
                    })),
            )
            .child(
                div()
                    .flex_1()
                    .text_sm()
                    .font_weight(FontWeight::MEDIUM)
                    .text_color(theme.foreground)
                    .child("Art Info"),
            )
            .child(
                Button::new("new-chat")
                    .ghost()
                    .small()
                    .icon(IconName::Plus)
                    .child("New chat")
                    .on_click(cx.listener(|this, _, window, cx| {
                        this.new_chat(window, cx);
                    })),
            )
    }

    fn render_sidebar(&self, sidebar: Entity<HistorySidebar>, visible: bool) -> impl IntoElement {
        let (start_width, end_width) =
            sidebar_animation_span(visible, self.animation_trigger, self.sidebar_width);

        div()
            .id("sidebar-container")
            .h_full()
            .flex_shrink_0()
            .overflow_hidden()
            .child(sidebar)
            .with_animation(
                ("sidebar-anim", self.animation_trigger),
                Animation::new(SIDEBAR_ANIMATION_DURATION).with_easing(ease_in_out),
                move |el, delta| {
                    let width = start_width + (end_width - start_width) * delta;
                    el.w(px(width))
                },
            )
    }

    fn render_resize_handle(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        div()
            .id("sidebar-resize-handle")
            .w(px(1.0))
            .h_full()
            .flex_shrink_0()
            .cursor(CursorStyle::ResizeLeftRight)
            .bg(theme.border)
            .hover(|el| el.bg(theme.primary))
            .on_drag(SidebarResizeDrag, |_, _, _, cx| cx.new(|_| EmptyDragView))
            .on_drag_move::<SidebarResizeDrag>(cx.listener(
                |this, event: &DragMoveEvent<SidebarResizeDrag>, _window, cx| {
                    let new_width: f32 = event.event.position.x.into();
                    this.resize_sidebar(new_width, cx);
                },
            ))
    }
}

impl Render for ChatAppShell {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let chat_view = self.chat_view.read(cx);
        let visible = chat_view.sidebar_visible();
        let sidebar = chat_view.sidebar().clone();

        v_flex()
            .id("app-shell")
            .key_context("ArtInfoShell")
            .size_full()
            .relative()
            .bg(theme.background)
            .on_action(cx.listener(|this, _: &NewChat, window, cx| {
                this.new_chat(window, cx);
            }))
            .on_action(cx.listener(|this, _: &ToggleSidebar, _window, cx| {
                this.toggle_sidebar(cx);
            }))
            .child(self.render_header(cx))
            .child(
                h_flex()
                    .flex_1()
                    .min_h_0()
                    .w_full()
                    .child(self.render_sidebar(sidebar, visible))
                    .when(visible, |el| el.child(self.render_resize_handle(cx)))
                    .child(
                        v_flex()
                            .id("main-content")
                            .flex_1()
                            .h_full()
                            .min_w_0()
                            .min_h_0()
                            .overflow_hidden()
                            .child(self.chat_view.clone()),
                    ),
            )
            .child(self.notification_list.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidebar_width_is_clamped() {
        assert_eq!(compute_sidebar_width(50.0), SIDEBAR_MIN_WIDTH);
        assert_eq!(compute_sidebar_width(300.0), 300.0);
        assert_eq!(compute_sidebar_width(900.0), SIDEBAR_MAX_WIDTH);
    }

    #[test]
    fn sidebar_only_animates_after_a_toggle() {
        assert_eq!(sidebar_animation_span(false, 0, 260.0), (0.0, 0.0));
        assert_eq!(sidebar_animation_span(true, 1, 260.0), (0.0, 260.0));
        assert_eq!(sidebar_animation_span(false, 2, 260.0), (260.0, 0.0));
    }
}
