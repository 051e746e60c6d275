use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Program};
use iced::{Point, Rectangle, Renderer, Theme};

use crate::imaging::CropPoint;
use crate::Message;

/// Pointer surface laid over the crop preview.
///
/// It only translates mouse input into preview-space crop messages; the
/// preview frame underneath already carries the dimming and outline.
#[derive(Debug, Clone, Copy, Default)]
pub struct CropSurface;

/// Convert a window position into preview pixels
fn to_preview(position: Point, bounds: Rectangle) -> CropPoint {
    CropPoint::new(position.x - bounds.x, position.y - bounds.y)
}

impl Program<Message> for CropSurface {
    type State = DragState;

    fn draw(
        &self,
        _state: &Self::State,
        _renderer: &Renderer,
        _theme: &Theme,
        _bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        vec![]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            // Mouse button press over the preview - anchor a selection
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(pos) = cursor.position_over(bounds) {
                    state.is_dragging = true;
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::CropPointerDown(to_preview(pos, bounds))),
                    );
                }
            }

            // Mouse button release - freeze the selection, even outside the preview
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if state.is_dragging {
                    state.is_dragging = false;
                    return (canvas::event::Status::Captured, Some(Message::CropPointerUp));
                }
            }

            // Mouse move - track the opposite corner while dragging
            canvas::Event::Mouse(mouse::Event::CursorMoved { position }) => {
                if state.is_dragging {
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::CropPointerMoved(to_preview(position, bounds))),
                    );
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(&self, _state: &Self::State, bounds: Rectangle, cursor: Cursor) -> mouse::Interaction {
        if cursor.is_over(bounds) {
            mouse::Interaction::Crosshair
        } else {
            mouse::Interaction::default()
        }
    }
}

/// State for drag interactions
#[derive(Debug, Clone, Default)]
pub struct DragState {
    pub is_dragging: bool,
}
