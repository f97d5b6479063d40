use serde::{Deserialize, Serialize};

/// Per-word highlight rule, rendered as an ASS override tag ahead of the
/// active word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    pub text_colour: String,
    pub border_colour: String,
    pub fade: bool,
}

impl HighlightStyle {
    /// Override block for the highlighted word; colours carry their &H prefix.
    pub fn override_tag(&self) -> String {
        if self.fade {
            format!(
                "{{\\1c{}\\3c{}\\fad(50,50)}}",
                self.text_colour, self.border_colour
            )
        } else {
            format!("{{\\1c{}\\3c{}}}", self.text_colour, self.border_colour)
        }
    }
}

/// Visual style of the rendered track: the ASS V4+ style fields plus the
/// optional per-word highlight. Colours are ASS &HAABBGGRR strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub title: String,
    pub font: String,
    pub font_size: u32,
    pub primary_colour: String,
    pub secondary_colour: String,
    pub outline_colour: String,
    pub back_colour: String,
    /// ASS boolean: -1 on, 0 off
    pub bold: i32,
    pub italic: i32,
    pub underline: i32,
    pub strikeout: i32,
    pub scale_x: u32,
    pub scale_y: u32,
    pub spacing: f64,
    pub angle: f64,
    pub border_style: u32,
    pub outline: f64,
    pub shadow: f64,
    /// Numpad alignment, 1..=9
    pub alignment: u32,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
    pub encoding: u32,
    pub play_res_x: u32,
    pub play_res_y: u32,
    pub wrap_style: u32,
    pub scaled_border_and_shadow: bool,
    pub highlight: Option<HighlightStyle>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            title: "Default".to_string(),
            font: "Comic Sans MS".to_string(),
            font_size: 80,
            primary_colour: "&H00FFAAFF".to_string(),
            secondary_colour: "&H00000000".to_string(),
            outline_colour: "&H005D3E5D".to_string(),
            back_colour: "&H00442E44".to_string(),
            bold: -1,
            italic: 0,
            underline: 0,
            strikeout: 0,
            scale_x: 100,
            scale_y: 100,
            spacing: 0.0,
            angle: 0.0,
            border_style: 1,
            outline: 8.0,
            shadow: 10.0,
            alignment: 2,
            margin_l: 10,
            margin_r: 10,
            margin_v: 350,
            encoding: 0,
            play_res_x: 1920,
            play_res_y: 1080,
            wrap_style: 0,
            scaled_border_and_shadow: true,
            highlight: Some(HighlightStyle {
                text_colour: "&H00FFFF55".to_string(),
                border_colour: "&H00353512".to_string(),
                fade: false,
            }),
        }
    }
}

/// Partial style: fields present here replace the matching active fields,
/// absent fields are left alone. The highlight field distinguishes "leave"
/// (None) from "clear" (Some(None)).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePatch {
    pub title: Option<String>,
    pub font: Option<String>,
    pub font_size: Option<u32>,
    pub primary_colour: Option<String>,
    pub secondary_colour: Option<String>,
    pub outline_colour: Option<String>,
    pub back_colour: Option<String>,
    pub bold: Option<i32>,
    pub italic: Option<i32>,
    pub underline: Option<i32>,
    pub strikeout: Option<i32>,
    pub scale_x: Option<u32>,
    pub scale_y: Option<u32>,
    pub spacing: Option<f64>,
    pub angle: Option<f64>,
    pub border_style: Option<u32>,
    pub outline: Option<f64>,
    pub shadow: Option<f64>,
    pub alignment: Option<u32>,
    pub margin_l: Option<u32>,
    pub margin_r: Option<u32>,
    pub margin_v: Option<u32>,
    pub encoding: Option<u32>,
    pub play_res_x: Option<u32>,
    pub play_res_y: Option<u32>,
    pub wrap_style: Option<u32>,
    pub scaled_border_and_shadow: Option<bool>,
    pub highlight: Option<Option<HighlightStyle>>,
}

impl Style {
    /// Merges the patch into the style. Returns true when anything changed.
    pub fn apply(&mut self, patch: &StylePatch) -> bool {
        let before = self.clone();

        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $( if let Some(value) = &patch.$field { self.$field = value.clone(); } )*
            };
        }
        merge!(
            title,
            font,
            font_size,
            primary_colour,
            secondary_colour,
            outline_colour,
            back_colour,
            bold,
            italic,
            underline,
            strikeout,
            scale_x,
            scale_y,
            spacing,
            angle,
            border_style,
            outline,
            shadow,
            alignment,
            margin_l,
            margin_r,
            margin_v,
            encoding,
            play_res_x,
            play_res_y,
            wrap_style,
            scaled_border_and_shadow,
            highlight,
        );

        *self != before
    }
}
