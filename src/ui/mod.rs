/// GUI glue: pointer input for the cropper, clipboard access and warning dialogs

pub mod canvas;
pub mod clipboard;
pub mod notice;
