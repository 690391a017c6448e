use chrono::NaiveDate;
use handlebars::{Handlebars, RenderError};
use lazy_static::lazy_static;
use serde::Serialize;

use crate::config::{API_KEY_SIGNUP_URL, ARCHIVE_START};
use crate::models::{ApodRecord, MediaType, RateLimitSnapshot};
use crate::services::cache_key;

const PAGE_TEMPLATE_NAME: &str = "page";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{#if record}}{{record.title}} | {{/if}}Astronomy Picture of the Day</title>
</head>
<body>
<header>
<h1><a href="/">Astronomy Picture of the Day</a></h1>
<form method="post" action="/get-date-picture">
<label for="date">Pick a date</label>
<input type="date" id="date" name="date" min="{{picker_min}}" max="{{picker_max}}" value="{{selected_date}}" required>
<button type="submit">Show</button>
<a href="/random">Random picture</a>
</form>
</header>
<main>
{{#if error}}<p class="error" role="alert">{{error}}</p>
{{/if}}
{{#with record}}<article>
<h2>{{title}}</h2>
<p class="date">{{date}}</p>
{{#if is_image}}<a href="{{full_url}}"><img src="{{url}}" alt="{{title}}"></a>
{{/if}}
{{#if is_video}}<iframe src="{{url}}" title="{{title}}" allowfullscreen></iframe>
{{/if}}
{{#if is_link}}<p><a href="{{url}}">View today's media</a></p>
{{/if}}
{{#if thumbnail_url}}<img src="{{thumbnail_url}}" alt="">
{{/if}}
<p class="explanation">{{explanation}}</p>
{{#if copyright}}<p class="copyright">&copy; {{copyright}}</p>
{{/if}}
</article>
{{/with}}
</main>
<footer>
{{#if rate_limit}}<p class="rate-limit">API requests remaining: {{rate_limit.remaining}}{{#if rate_limit.limit}} of {{rate_limit.limit}}{{/if}}</p>{{else}}<p class="rate-limit">Data from NASA. Get your own API key at <a href="{{signup_url}}">{{signup_url}}</a></p>{{/if}}
</footer>
</body>
</html>
"#;

lazy_static! {
    static ref TEMPLATES: Handlebars<'static> = {
        let mut registry = Handlebars::new();
        registry
            .register_template_string(PAGE_TEMPLATE_NAME, PAGE_TEMPLATE)
            .expect("page template is valid");
        registry
    };
}

pub struct PageView<'a> {
    pub record: Option<&'a ApodRecord>,
    pub error: Option<&'a str>,
    /// Value to pre-fill in the date picker.
    pub selected_date: Option<&'a str>,
    pub today: NaiveDate,
    pub rate_limit: RateLimitSnapshot,
}

#[derive(Serialize)]
struct PageContext<'a> {
    record: Option<RecordContext<'a>>,
    error: Option<&'a str>,
    selected_date: &'a str,
    picker_min: String,
    picker_max: String,
    rate_limit: Option<RateLimitContext>,
    signup_url: &'static str,
}

#[derive(Serialize)]
struct RecordContext<'a> {
    title: &'a str,
    date: &'a str,
    explanation: &'a str,
    url: Option<&'a str>,
    full_url: Option<&'a str>,
    thumbnail_url: Option<&'a str>,
    copyright: Option<&'a str>,
    is_image: bool,
    is_video: bool,
    is_link: bool,
}

#[derive(Serialize)]
struct RateLimitContext {
    remaining: u32,
    limit: Option<u32>,
}

impl<'a> RecordContext<'a> {
    fn new(record: &'a ApodRecord) -> Self {
        let url = record.url.as_deref();
        let has_url = url.is_some();
        Self {
            title: &record.title,
            date: &record.date,
            explanation: &record.explanation,
            url,
            full_url: record.hdurl.as_deref().or(url),
            // Only shown when there is no primary media URL.
            thumbnail_url: if has_url { None } else { record.thumbnail_url.as_deref() },
            copyright: record.copyright.as_deref().map(str::trim),
            is_image: has_url && record.media_type == MediaType::Image,
            is_video: has_url && record.media_type == MediaType::Video,
            is_link: has_url && record.media_type == MediaType::Other,
        }
    }
}

pub fn render_page(view: &PageView<'_>) -> Result<String, RenderError> {
    let context = PageContext {
        record: view.record.map(RecordContext::new),
        error: view.error,
        selected_date: view.selected_date.unwrap_or_default(),
        picker_min: cache_key(*ARCHIVE_START),
        picker_max: cache_key(view.today),
        rate_limit: view.rate_limit.remaining.map(|remaining| RateLimitContext {
            remaining,
            limit: view.rate_limit.limit,
        }),
        signup_url: API_KEY_SIGNUP_URL,
    };
    TEMPLATES.render(PAGE_TEMPLATE_NAME, &context)
}
