use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::llm::media::EncodedImage;
use crate::llm::types::{AnalysisResult, ColorSwatch, RestorationStep, SceneDetection};
use crate::session::{Session, SessionState, Slot};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?([0-9A-Fa-f]{6})$").expect("valid hex color regex"));

const STYLE: &str = r#"
body { margin: 0; background: #020617; color: #e2e8f0; font-family: system-ui, -apple-system, "Segoe UI", sans-serif; }
header { background: #0f172a; border-bottom: 1px solid #1e293b; padding: 24px 0; }
header .inner, main { max-width: 1100px; margin: 0 auto; padding: 0 16px; }
header .inner { display: flex; justify-content: space-between; align-items: center; }
h1 { margin: 0; font-size: 1.5rem; color: #fff; }
.subtitle { margin: 4px 0 0; color: #94a3b8; font-size: .9rem; }
main { margin-top: 40px; padding-bottom: 80px; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(320px, 1fr)); gap: 32px; }
.card { background: #0f172a; border: 1px solid #1e293b; border-radius: 16px; padding: 28px; }
.dropzone { border: 2px dashed #334155; min-height: 320px; display: flex; flex-direction: column; align-items: center; justify-content: center; text-align: center; }
.dropzone img { max-height: 256px; max-width: 100%; border-radius: 8px; border: 1px solid #334155; margin-bottom: 16px; }
.muted { color: #94a3b8; font-size: .9rem; }
button { cursor: pointer; border: 0; border-radius: 8px; padding: 10px 22px; font-weight: 600; background: #2563eb; color: #fff; }
button.secondary { background: #1e293b; color: #cbd5e1; border: 1px solid #334155; }
button.link { background: none; color: #f87171; text-decoration: underline; padding: 4px; }
button.danger { background: #dc2626; }
.actions { text-align: center; margin-top: 40px; }
.actions button { font-size: 1.1rem; padding: 16px 48px; }
section { margin-bottom: 40px; }
section h2 { text-transform: uppercase; letter-spacing: .08em; font-size: 1rem; color: #cbd5e1; }
.label { color: #64748b; font-size: .75rem; font-weight: 700; text-transform: uppercase; margin: 0 0 6px; }
.tags span { display: inline-block; background: #1e293b; border: 1px solid #334155; border-radius: 999px; padding: 4px 12px; margin: 0 6px 6px 0; font-size: .85rem; }
.palette { display: grid; grid-template-columns: repeat(auto-fill, minmax(180px, 1fr)); gap: 16px; }
.swatch { background: #0f172a; border: 1px solid #1e293b; border-radius: 12px; overflow: hidden; }
.swatch .fill { height: 96px; background: repeating-linear-gradient(45deg, #1e293b, #1e293b 8px, #0f172a 8px, #0f172a 16px); }
.swatch .meta { padding: 12px; }
.swatch code { color: #60a5fa; font-size: .7rem; }
.text-analysis { border-left: 3px solid #f59e0b; padding-left: 12px; color: #fde68a; font-style: italic; }
ol.steps { list-style: none; padding: 0; counter-reset: none; }
ol.steps li { display: flex; gap: 16px; margin-bottom: 20px; }
ol.steps .num { flex: none; width: 32px; height: 32px; border-radius: 999px; background: #1e293b; display: flex; align-items: center; justify-content: center; font-weight: 700; }
ol.steps .tag { font-family: monospace; font-size: .7rem; background: #1e293b; border: 1px solid #334155; border-radius: 6px; padding: 2px 8px; margin-left: 8px; }
pre.prompt { white-space: pre-wrap; background: #020617; border: 1px solid #1e3a8a; border-radius: 12px; padding: 20px; font-size: .95rem; }
.prompt-head { display: flex; justify-content: space-between; align-items: center; }
.ack { background: #16a34a; }
.error { text-align: center; max-width: 560px; margin: 0 auto; border-color: #7f1d1d; }
.error h2 { color: #f87171; }
footer { text-align: center; color: #475569; font-size: .8rem; padding: 0 16px 40px; }
"#;

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// `#RRGGBB` for six hex digits with or without `#`; anything else is not a
/// color we can paint.
pub fn normalize_hex(value: &str) -> Option<String> {
    HEX_COLOR_RE
        .captures(value.trim())
        .map(|captures| format!("#{}", captures[1].to_ascii_uppercase()))
}

/// How long until the page should re-fetch itself, if at all.
fn refresh_seconds(session: &Session, copy_ack_millis: u64) -> Option<u64> {
    match session.state() {
        SessionState::Loading => Some(2),
        SessionState::Success(_) if session.prompt_copied() => {
            Some(copy_ack_millis.div_ceil(1000).max(1))
        }
        _ => None,
    }
}

pub fn render_page(session: &Session, copy_ack_millis: u64) -> String {
    let mut body = String::new();
    match session.state() {
        SessionState::Idle => render_idle(&mut body, session),
        SessionState::Loading => render_loading(&mut body),
        SessionState::Success(result) => {
            render_result(&mut body, result, session.prompt_copied())
        }
        SessionState::Error(message) => render_error(&mut body, message),
    }

    let refresh = refresh_seconds(session, copy_ack_millis)
        .map(|seconds| format!("<meta http-equiv=\"refresh\" content=\"{seconds}\">"))
        .unwrap_or_default();
    let header_action = if matches!(session.state(), SessionState::Success(_)) {
        "<form method=\"post\" action=\"/reset\"><button class=\"secondary\" type=\"submit\">Nová analýza</button></form>"
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="sk">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
{refresh}<title>ChromaRestore AI Expert</title>
<style>{STYLE}</style>
</head>
<body>
<header><div class="inner">
<div><h1>ChromaRestore AI Expert</h1><p class="subtitle">Systém pre digitálnu rekonštrukciu historických fotografií</p></div>
{header_action}
</div></header>
<main>
{body}
</main>
<footer><p>ChromaRestore AI Expert využíva multimodálne modely Gemini pre analýzu obrazových dát. Všetky historické fakty a farby sú odhadované na základe sémantickej analýzy a tréningových dát modelu.</p></footer>
</body>
</html>
"#
    )
}

fn render_slot(out: &mut String, slot: Slot, image: Option<&EncodedImage>) {
    let (title, hint, filled_label, path) = match slot {
        Slot::Primary => (
            "Nahrajte ČB fotografiu",
            "Snímka, ktorú chcete analyzovať a farebne zrekonštruovať.",
            "Hlavná ČB fotografia",
            "primary",
        ),
        Slot::Reference => (
            "Referenčná predloha (voliteľné)",
            "Farebná fotka pre analýzu pleťových tónov a atmosféry.",
            "Farebná referenčná predloha",
            "reference",
        ),
    };

    out.push_str("<div class=\"card dropzone\">");
    match image {
        Some(image) => {
            let _ = write!(
                out,
                "<img src=\"{}\" alt=\"{}\"><p>{}</p>\
                 <form method=\"post\" action=\"/images/{path}/clear\"><button class=\"link\" type=\"submit\">Odstrániť</button></form>",
                escape_html(&image.preview_uri),
                escape_html(filled_label),
                escape_html(filled_label),
            );
        }
        None => {
            let _ = write!(
                out,
                "<h3>{title}</h3><p class=\"muted\">{hint}</p>\
                 <form method=\"post\" action=\"/images/{path}\" enctype=\"multipart/form-data\">\
                 <input type=\"file\" name=\"file\" accept=\"image/*\" required> \
                 <button type=\"submit\">Vybrať súbor</button></form>"
            );
        }
    }
    out.push_str("</div>");
}

fn render_idle(out: &mut String, session: &Session) {
    out.push_str("<div class=\"grid\">");
    render_slot(out, Slot::Primary, session.image(Slot::Primary));
    render_slot(out, Slot::Reference, session.image(Slot::Reference));
    out.push_str("</div>");

    if session.image(Slot::Primary).is_some() {
        out.push_str(
            "<div class=\"actions\"><form method=\"post\" action=\"/analyze\">\
             <button type=\"submit\">Spustiť Expertnú Analýzu</button></form></div>",
        );
    }
}

fn render_loading(out: &mut String) {
    out.push_str(
        "<div class=\"card\" style=\"text-align:center\">\
         <h2>ChromaRestore AI pracuje...</h2>\
         <ul class=\"muted\" style=\"list-style:none;padding:0\">\
         <li>Detekcia sémantických vrstiev scény...</li>\
         <li>Výpočet chromatickej mapy...</li>\
         <li>Generovanie technického Imagen promptu...</li>\
         </ul></div>",
    );
}

fn render_error(out: &mut String, message: &str) {
    let _ = write!(
        out,
        "<div class=\"card error\"><h2>Chyba systému</h2><p>{}</p>\
         <form method=\"post\" action=\"/retry\"><button class=\"danger\" type=\"submit\">Skúsiť znova</button></form></div>",
        escape_html(message)
    );
}

fn render_scene(out: &mut String, scene: &SceneDetection) {
    let _ = write!(
        out,
        "<section class=\"card\" id=\"scene\"><h2>[Detekcia scény]</h2>\
         <p class=\"label\">Popis a Kontext</p><p>{}</p>\
         <div class=\"grid\"><div><p class=\"label\">Obdobie</p><p>{}</p></div>\
         <div><p class=\"label\">Lokalita/Kontext</p><p>{}</p></div></div>",
        escape_html(&scene.description),
        escape_html(&scene.era),
        escape_html(&scene.context),
    );

    if let Some(text_analysis) = &scene.text_analysis {
        let _ = write!(
            out,
            "<div id=\"text-analysis\"><p class=\"label\">Analýza Textu</p><p class=\"text-analysis\">{}</p></div>",
            escape_html(text_analysis)
        );
    }

    out.push_str("<p class=\"label\">Detekované Predmety</p><div class=\"tags\">");
    for object in &scene.objects {
        let _ = write!(out, "<span>{}</span>", escape_html(object));
    }
    out.push_str("</div></section>");
}

fn render_swatch(out: &mut String, swatch: &ColorSwatch) {
    let fill = normalize_hex(&swatch.hex)
        .map(|hex| format!(" style=\"background:{hex}\""))
        .unwrap_or_default();
    let _ = write!(
        out,
        "<div class=\"swatch\"><div class=\"fill\"{fill}></div><div class=\"meta\">\
         <p class=\"label\">{}</p><code>{}</code><p class=\"muted\">{}</p></div></div>",
        escape_html(&swatch.label),
        escape_html(&swatch.hex),
        escape_html(&swatch.description),
    );
}

fn render_step(out: &mut String, index: usize, step: &RestorationStep) {
    let _ = write!(
        out,
        "<li><span class=\"num\">{}</span><div><h4>{}<span class=\"tag\">{}</span></h4>\
         <p class=\"muted\">{}</p></div></li>",
        index + 1,
        escape_html(&step.step),
        escape_html(&step.action),
        escape_html(&step.details),
    );
}

fn render_result(out: &mut String, result: &AnalysisResult, prompt_copied: bool) {
    render_scene(out, &result.scene_detection);

    out.push_str("<section id=\"palette\"><h2>[Farebná schéma]</h2><div class=\"palette\">");
    for swatch in &result.color_palette {
        render_swatch(out, swatch);
    }
    out.push_str("</div></section>");

    out.push_str(
        "<section class=\"card\" id=\"restoration\"><h2>[Pokyny pre rekonštrukciu]</h2><ol class=\"steps\">",
    );
    for (index, step) in result.restoration_guide.iter().enumerate() {
        render_step(out, index, step);
    }
    out.push_str("</ol></section>");

    let copy_button = if prompt_copied {
        "<button class=\"ack\" type=\"submit\" disabled>Skopírované</button>"
    } else {
        "<button type=\"submit\">Kopírovať Prompt</button>"
    };
    let _ = write!(
        out,
        "<section class=\"card\" id=\"prompt\"><div class=\"prompt-head\"><h2>[Imagen Prompt]</h2>\
         <form method=\"post\" action=\"/prompt/copy\">{copy_button}</form></div>\
         <pre class=\"prompt\">{}</pre>\
         <p class=\"muted\">*Tento prompt je optimalizovaný pre moderné generatívne modely pre zachovanie pôvodnej štruktúry pri doplnení realistických farieb.</p></section>",
        escape_html(&result.imagen_prompt)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::load_image;
    use crate::llm::types::sample_result;

    fn success_session(result: AnalysisResult) -> Session {
        let mut session = Session::new("chyba");
        session.set_image(Slot::Primary, load_image(b"bw", Some("image/png")).unwrap());
        session.begin_analysis().unwrap();
        session.complete(Ok(result));
        session
    }

    #[test]
    fn hex_values_are_normalized_or_rejected() {
        assert_eq!(normalize_hex("#a1b2c3").as_deref(), Some("#A1B2C3"));
        assert_eq!(normalize_hex(" 8B5A2B ").as_deref(), Some("#8B5A2B"));
        assert_eq!(normalize_hex("#abc"), None);
        assert_eq!(normalize_hex("sepia"), None);
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn idle_page_offers_analysis_only_with_primary_image() {
        let mut session = Session::new("chyba");
        let html = render_page(&session, 2000);
        assert!(html.contains("action=\"/images/primary\""));
        assert!(!html.contains("action=\"/analyze\""));

        session.set_image(Slot::Primary, load_image(b"bw", Some("image/png")).unwrap());
        let html = render_page(&session, 2000);
        assert!(html.contains("src=\"data:image/png;base64,Ync=\""));
        assert!(html.contains("action=\"/images/primary/clear\""));
        assert!(html.contains("action=\"/analyze\""));
    }

    #[test]
    fn loading_page_refreshes_itself() {
        let mut session = Session::new("chyba");
        session.set_image(Slot::Primary, load_image(b"bw", Some("image/png")).unwrap());
        session.begin_analysis().unwrap();
        let html = render_page(&session, 2000);
        assert!(html.contains("http-equiv=\"refresh\" content=\"2\""));
        assert!(html.contains("ChromaRestore AI pracuje"));
    }

    #[test]
    fn success_page_renders_every_field() {
        let result = sample_result();
        let html = render_page(&success_session(result.clone()), 2000);

        assert!(html.contains(&escape_html(&result.scene_detection.description)));
        assert!(html.contains(&result.scene_detection.era));
        assert!(html.contains(&result.scene_detection.context));
        for object in &result.scene_detection.objects {
            assert!(html.contains(&format!("<span>{object}</span>")));
        }
        assert!(html.contains("id=\"text-analysis\""));
        assert!(html.contains(&escape_html(
            result.scene_detection.text_analysis.as_deref().unwrap()
        )));
        for swatch in &result.color_palette {
            assert!(html.contains(&format!("style=\"background:{}\"", swatch.hex)));
            assert!(html.contains(&swatch.label));
        }
        assert!(html.contains("<span class=\"num\">1</span><div><h4>Remove dust and scratches"));
        assert!(html.contains("<span class=\"num\">2</span><div><h4>Reduce grain"));
        assert!(html.contains(&result.imagen_prompt));
        assert!(html.contains("Kopírovať Prompt"));
        assert!(html.contains("action=\"/reset\""));
        assert!(!html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn absent_text_analysis_omits_the_block() {
        let mut result = sample_result();
        result.scene_detection.text_analysis = None;
        let html = render_page(&success_session(result), 2000);
        assert!(!html.contains("id=\"text-analysis\""));
        assert!(!html.contains("Analýza Textu"));
    }

    #[test]
    fn unpaintable_hex_renders_without_fill() {
        let mut result = sample_result();
        result.color_palette[0].hex = "umber".to_string();
        let html = render_page(&success_session(result), 2000);
        assert!(html.contains("<div class=\"fill\"></div><div class=\"meta\"><p class=\"label\">Weathered timber"));
    }

    #[test]
    fn copied_prompt_shows_acknowledgment_and_refreshes() {
        let mut session = success_session(sample_result());
        let prompt = sample_result().imagen_prompt;
        assert!(session.mark_prompt_copied(&prompt).is_some());
        let html = render_page(&session, 2000);
        assert!(html.contains("Skopírované"));
        assert!(html.contains("http-equiv=\"refresh\" content=\"2\""));
    }

    #[test]
    fn error_page_shows_message_and_retry() {
        let mut session = Session::new("Nepodarilo sa <analyzovať>");
        session.set_image(Slot::Primary, load_image(b"bw", Some("image/png")).unwrap());
        session.begin_analysis().unwrap();
        session.complete(Err(crate::llm::AnalysisError::MissingApiKey));
        let html = render_page(&session, 2000);
        assert!(html.contains("Nepodarilo sa &lt;analyzovať&gt;"));
        assert!(html.contains("action=\"/retry\""));
    }
}
