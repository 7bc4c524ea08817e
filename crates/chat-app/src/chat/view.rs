use std::sync::Arc;

use chrono::Local;
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{ActiveTheme, label::Label, text::TextView, v_flex};
use gpui_tokio_bridge::Tokio;

use artinfo_answer::{Answer, AnswerService, create_service};
use artinfo_session::{
    ConfigStore, Intent, PendingSubmission, Session, SessionView, SubmissionId,
    SETTINGS_DIRECTORY_NAME, SETTINGS_FILE_NAME, SubmitFailure, load_images, resolve_answer,
};

use crate::chat::events::{
    AttachmentRemoved, ExchangeSelected, ImagesDropped, PromptEdited, SubmitRequested,
};
use crate::chat::{HistorySidebar, QuestionComposer};

/// User-facing text for an answer service that could not be created.
pub fn service_setup_notice(error: &str) -> String {
    format!(
        "Answer service is not configured: {error}. Check {}/{} or ARTINFO_ENDPOINT.",
        SETTINGS_DIRECTORY_NAME, SETTINGS_FILE_NAME
    )
}

const ANSWER_PLACEHOLDER: &str = "Drop images of an artwork and press Submit to learn about it.";

/// Owns the session and routes child view events into it as intents.
pub struct ChatView {
    session: Session,
    view: SessionView,
    sidebar: Entity<HistorySidebar>,
    composer: Entity<QuestionComposer>,
    service: Option<Arc<dyn AnswerService>>,
    service_error: Option<String>,
    submission_task: Option<Task<()>>,
}

impl ChatView {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let sidebar = cx.new(HistorySidebar::new);
        let composer = cx.new(|cx| QuestionComposer::new(window, cx));

        let store = ConfigStore::load();
        let config = store.config().clone();
        tracing::info!(
            endpoint = %config.endpoint,
            limit = %config.policy.attachment_limit,
            "loaded settings"
        );

        let (service, service_error) = match create_service(config.service_config()) {
            Ok(service) => (Some(service), None),
            Err(error) => {
                tracing::error!(stage = error.stage(), "failed to create answer service: {error}");
                (None, Some(error.to_string()))
            }
        };

        let session = Session::new(config.policy);
        let view = SessionView::project(&session);

        cx.subscribe(&sidebar, |this, _, event: &ExchangeSelected, cx| {
            this.apply(Intent::SelectExchange(event.exchange), cx);
        })
        .detach();
        cx.subscribe(&composer, |this, _, event: &PromptEdited, cx| {
            this.apply(Intent::EditPrompt(event.prompt.clone()), cx);
        })
        .detach();
        cx.subscribe(&composer, |this, _, event: &ImagesDropped, cx| {
            this.handle_images_dropped(event, cx);
        })
        .detach();
        cx.subscribe(&composer, |this, _, event: &AttachmentRemoved, cx| {
            this.apply(Intent::RemoveAttachment(event.index), cx);
        })
        .detach();
        cx.subscribe(&composer, |this, _, _: &SubmitRequested, cx| {
            this.handle_submit(cx);
        })
        .detach();

        let mut this = Self {
            session,
            view,
            sidebar,
            composer,
            service,
            service_error,
            submission_task: None,
        };
        this.sync_children(cx);
        this
    }

    pub fn sidebar(&self) -> &Entity<HistorySidebar> {
        &self.sidebar
    }

    pub fn service_error(&self) -> Option<&str> {
        self.service_error.as_deref()
    }

    pub fn sidebar_visible(&self) -> bool {
        self.view.sidebar_visible
    }

    pub fn toggle_sidebar(&mut self, cx: &mut Context<Self>) -> bool {
        self.apply(Intent::ToggleSidebar, cx);
        self.view.sidebar_visible
    }

    pub fn new_chat(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.apply(Intent::NewSession, cx);
        self.composer
            .update(cx, |composer, cx| composer.clear(window, cx));
    }

    fn apply(&mut self, intent: Intent, cx: &mut Context<Self>) -> Option<PendingSubmission> {
        let pending = self.session.dispatch(intent);
        self.sync_children(cx);
        pending
    }

    fn handle_images_dropped(&mut self, event: &ImagesDropped, cx: &mut Context<Self>) {
        let images = load_images(&event.paths);
        if images.is_empty() {
            tracing::debug!("drop contained no readable images");
            return;
        }

        self.apply(Intent::AddAttachments(images), cx);
    }

    fn handle_submit(&mut self, cx: &mut Context<Self>) {
        let Some(service) = self.service.clone() else {
            tracing::warn!("submit ignored: answer service is not configured");
            return;
        };
        let Some(pending) = self.apply(Intent::Submit, cx) else {
            return;
        };

        let submission = pending.submission;
        tracing::info!(submission = %submission, "submitting question");

        let worker = Tokio::spawn(cx, async move {
            resolve_answer(service.as_ref(), pending.request, pending.budget).await
        });

        self.submission_task = Some(cx.spawn(async move |this, cx| {
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(error) => Err(SubmitFailure::request_failed(format!(
                    "answer worker stopped: {error}"
                ))),
            };

            let _ = this.update(cx, |this, cx| {
                this.finish_submission(submission, outcome, cx);
            });
        }));
    }

    fn finish_submission(
        &mut self,
        submission: SubmissionId,
        outcome: Result<Answer, SubmitFailure>,
        cx: &mut Context<Self>,
    ) {
        // Late outcomes are rejected by the session and change nothing on screen.
        if let Ok(settled) = self.session.settle(submission, outcome, Local::now()) {
            tracing::debug!(?settled, "submission settled");
            self.sync_children(cx);
        }
    }

    fn sync_children(&mut self, cx: &mut Context<Self>) {
        self.view = SessionView::project(&self.session);

        let history = self.view.history.clone();
        self.sidebar
            .update(cx, |sidebar, cx| sidebar.set_history(&history, cx));

        let previews = self.session.previews().clone();
        let view = self.view.clone();
        self.composer
            .update(cx, |composer, cx| composer.set_view(&view, &previews, cx));

        cx.notify();
    }

    fn render_answer_pane(&self, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let muted = theme.foreground.opacity(0.55);

        if self.view.loading {
            return Label::new("Generating answer...")
                .text_sm()
                .text_color(muted)
                .into_any_element();
        }

        match &self.view.active_answer {
            Some(answer) => TextView::markdown("active-answer", answer.clone()).into_any_element(),
            None => Label::new(ANSWER_PLACEHOLDER)
                .text_sm()
                .text_color(muted)
                .into_any_element(),
        }
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let error_message = self.view.error_message.clone();
        let service_error = self.service_error.as_deref().map(service_setup_notice);

        v_flex()
            .id("chat-view")
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .when_some(service_error, |el, error| {
                el.child(
                    div()
                        .id("service-error")
                        .w_full()
                        .px_4()
                        .py_2()
                        .text_sm()
                        .text_color(theme.danger)
                        .child(error),
                )
            })
            .child(
                div()
                    .id("answer-pane")
                    .flex_1()
                    .min_h_0()
                    .px_6()
                    .py_4()
                    .overflow_y_scroll()
                    .child(self.render_answer_pane(cx)),
            )
            .when_some(error_message, |el, message| {
                el.child(
                    div()
                        .id("submission-error")
                        .w_full()
                        .px_4()
                        .py_2()
                        .border_t_1()
                        .border_color(theme.border)
                        .text_sm()
                        .text_color(theme.danger)
                        .child(message),
                )
            })
            .child(
                div()
                    .id("chat-view-composer")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.composer.clone()),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_notice_names_the_cause_and_where_to_fix_it() {
        let notice = service_setup_notice("invalid answer endpoint 'nope'");

        assert!(notice.starts_with("Answer service is not configured: invalid answer endpoint 'nope'."));
        assert!(notice.contains(".artinfo/settings.json"));
        assert!(notice.contains("ARTINFO_ENDPOINT"));
    }
}
