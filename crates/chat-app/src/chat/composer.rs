use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, Disableable, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    v_flex,
};

use artinfo_session::{AttachmentView, ImageKind, PreviewId, PreviewRegistry, SessionView};

use crate::chat::events::{AttachmentRemoved, ImagesDropped, PromptEdited, SubmitRequested};

const THUMBNAIL_SIZE: f32 = 88.0;

struct Thumbnail {
    index: usize,
    file_name: SharedString,
    image: Option<Arc<Image>>,
}

/// Image drop zone, attachment previews, prompt input and submit button.
pub struct QuestionComposer {
    input_state: Entity<InputState>,
    prompt: String,
    prompt_editable: bool,
    can_add_attachment: bool,
    can_submit: bool,
    loading: bool,
    intake_hint: SharedString,
    thumbnails: Vec<Thumbnail>,
    decoded: HashMap<PreviewId, Arc<Image>>,
}

impl EventEmitter<PromptEdited> for QuestionComposer {}
impl EventEmitter<ImagesDropped> for QuestionComposer {}
impl EventEmitter<AttachmentRemoved> for QuestionComposer {}
impl EventEmitter<SubmitRequested> for QuestionComposer {}

impl QuestionComposer {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder("Ask a follow-up question about the artwork...")
                .auto_grow(2, 6)
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, state, _event: &InputEvent, _window, cx| {
                let value = state.read(cx).value().to_string();
                if value != this.prompt {
                    this.prompt = value.clone();
                    cx.emit(PromptEdited { prompt: value });
                }
            },
        )
        .detach();

        Self {
            input_state,
            prompt: String::new(),
            prompt_editable: false,
            can_add_attachment: true,
            can_submit: false,
            loading: false,
            intake_hint: SharedString::default(),
            thumbnails: Vec::new(),
            decoded: HashMap::new(),
        }
    }

    /// Mirrors the session projection. Preview images are decoded once per preview id.
    pub fn set_view(
        &mut self,
        view: &SessionView,
        previews: &PreviewRegistry,
        cx: &mut Context<Self>,
    ) {
        self.prompt_editable = view.can_edit_prompt;
        self.can_add_attachment = view.can_add_attachment;
        self.can_submit = view.can_submit;
        self.loading = view.loading;
        self.intake_hint = view.intake_hint.clone().into();

        self.decoded
            .retain(|id, _| view.attachments.iter().any(|attachment| attachment.preview == *id));
        self.thumbnails = view
            .attachments
            .iter()
            .map(|attachment| self.thumbnail(attachment, previews))
            .collect();

        cx.notify();
    }

    pub fn clear(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
        self.prompt.clear();
    }

    fn thumbnail(&mut self, attachment: &AttachmentView, previews: &PreviewRegistry) -> Thumbnail {
        let image = match self.decoded.get(&attachment.preview) {
            Some(image) => Some(image.clone()),
            None => previews.resolve(attachment.preview).map(|bytes| {
                let image = Arc::new(Image::from_bytes(
                    image_format(attachment.kind),
                    bytes.to_vec(),
                ));
                self.decoded.insert(attachment.preview, image.clone());
                image
            }),
        };

        Thumbnail {
            index: attachment.index,
            file_name: attachment.file_name.clone().into(),
            image,
        }
    }

    fn handle_drop(&mut self, paths: &ExternalPaths, cx: &mut Context<Self>) {
        if !self.can_add_attachment {
            return;
        }

        let paths: Vec<PathBuf> = paths.paths().to_vec();
        tracing::debug!(count = paths.len(), "files dropped on intake zone");
        self.emit_images(paths, cx);
    }

    fn choose_images(&mut self, cx: &mut Context<Self>) {
        if !self.can_add_attachment {
            return;
        }

        let chosen = cx.prompt_for_paths(image_picker_options());
        cx.spawn(async move |this, cx| {
            let paths = match chosen.await {
                Ok(Ok(Some(paths))) => paths,
                Ok(Ok(None)) | Err(_) => return,
                Ok(Err(error)) => {
                    tracing::warn!("file chooser failed: {error}");
                    return;
                }
            };

            tracing::debug!(count = paths.len(), "files chosen for intake zone");
            let _ = this.update(cx, |this, cx| this.emit_images(paths, cx));
        })
        .detach();
    }

    /// Dropped and chosen files share one path into the session.
    fn emit_images(&mut self, paths: Vec<PathBuf>, cx: &mut Context<Self>) {
        // The picker may resolve after the cap was reached.
        if !self.can_add_attachment || paths.is_empty() {
            return;
        }
        cx.emit(ImagesDropped { paths });
    }

    fn handle_submit(&mut self, cx: &mut Context<Self>) {
        if self.can_submit {
            cx.emit(SubmitRequested);
        }
    }

    fn render_drop_zone(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let enabled = self.can_add_attachment;
        let hover_bg = theme.accent;

        div()
            .id("image-drop-zone")
            .w_full()
            .min_h(px(72.))
            .p_3()
            .flex()
            .items_center()
            .justify_center()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .when(enabled, |el| {
                el.cursor_pointer()
                    .drag_over::<ExternalPaths>(move |style, _, _, _| style.bg(hover_bg))
                    .on_drop(cx.listener(|this, paths: &ExternalPaths, _window, cx| {
                        this.handle_drop(paths, cx);
                    }))
                    .on_click(cx.listener(|this, _: &ClickEvent, _window, cx| {
                        this.choose_images(cx);
                    }))
            })
            .child(
                Label::new(self.intake_hint.clone())
                    .text_sm()
                    .text_color(theme.foreground.opacity(if enabled { 0.7 } else { 0.45 })),
            )
    }

    fn render_thumbnails(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        h_flex()
            .id("attachment-previews")
            .w_full()
            .gap_2()
            .children(self.thumbnails.iter().map(|thumbnail| {
                let index = thumbnail.index;
                let preview = match &thumbnail.image {
                    Some(image) => img(image.clone())
                        .size_full()
                        .object_fit(ObjectFit::Cover)
                        .into_any_element(),
                    None => Label::new(thumbnail.file_name.clone())
                        .text_xs()
                        .into_any_element(),
                };

                div()
                    .id(("attachment", index))
                    .relative()
                    .size(px(THUMBNAIL_SIZE))
                    .rounded_md()
                    .overflow_hidden()
                    .border_1()
                    .border_color(theme.border)
                    .child(preview)
                    .child(
                        div().absolute().top(px(2.)).right(px(2.)).child(
                            Button::new(("remove-attachment", index))
                                .ghost()
                                .xsmall()
                                .icon(IconName::CircleX)
                                .disabled(self.loading)
                                .on_click(cx.listener(move |_this, _, _window, cx| {
                                    cx.emit(AttachmentRemoved { index });
                                })),
                        ),
                    )
            }))
    }
}

impl Render for QuestionComposer {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let prompt_disabled = !self.prompt_editable || self.loading;

        v_flex()
            .bg(theme.background)
            .gap_2()
            .p_3()
            .child(self.render_drop_zone(cx))
            .when(!self.thumbnails.is_empty(), |el| {
                el.child(self.render_thumbnails(cx))
            })
            .child(
                div()
                    .w_full()
                    .px_3()
                    .py_2()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .child(Input::new(&self.input_state).w_full().disabled(prompt_disabled)),
            )
            .child(
                h_flex()
                    .w_full()
                    .items_center()
                    .justify_between()
                    .child(
                        Label::new(if self.prompt_editable {
                            ""
                        } else {
                            "Follow-up questions unlock after the first answer."
                        })
                        .text_xs()
                        .text_color(theme.foreground.opacity(0.55)),
                    )
                    .child(
                        Button::new("submit")
                            .small()
                            .primary()
                            .icon(IconName::ArrowUp)
                            .child("Submit")
                            .disabled(!self.can_submit)
                            .on_click(cx.listener(|this, _, _window, cx| {
                                this.handle_submit(cx);
                            })),
                    ),
            )
    }
}

fn image_format(kind: ImageKind) -> ImageFormat {
    match kind {
        ImageKind::Png => ImageFormat::Png,
        ImageKind::Jpeg => ImageFormat::Jpeg,
        ImageKind::Gif => ImageFormat::Gif,
        ImageKind::Webp => ImageFormat::Webp,
        ImageKind::Bmp => ImageFormat::Bmp,
        ImageKind::Tiff => ImageFormat::Tiff,
        ImageKind::Svg => ImageFormat::Svg,
    }
}

fn image_picker_options() -> PathPromptOptions {
    PathPromptOptions {
        files: true,
        directories: false,
        multiple: true,
        prompt: Some("Choose images".into()),
    }
}
