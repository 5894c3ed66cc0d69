mod common;

use common::fixtures::{root_template, stylesheet};
use common::{TestResult, XHTML, context, init_logging};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use xdjango::testhelp::assert_xpath;
use xdjango::{
    ContextValue, PageRenderer, RendererCatalog, Settings, TemplateContext, TransformError,
    XdjangoError, render_to_string,
};

fn write(dir: &Path, path: &str, body: &str) -> std::io::Result<()> {
    let full = dir.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(full, stylesheet(body))
}

fn settings(dir: &Path) -> Settings {
    Settings {
        transforms: dir.to_path_buf(),
        ..Settings::default()
    }
}

#[test]
fn test_render_to_string_from_transforms_dir() -> TestResult {
    init_logging();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "hello.xslt", &root_template(r#"<xsl:value-of select="xdjango:greet()"/>"#))?;
    let out = render_to_string(&settings(dir.path()), "hello.xslt", context(json!({"greet": "hello world"})))?;
    assert_eq!(out, "hello world\n");
    Ok(())
}

#[test]
fn test_imported_calls_are_registered() -> TestResult {
    init_logging();
    let dir = tempfile::tempdir()?;
    write(
        dir.path(),
        "blog/base.xslt",
        r#"<xsl:include href="parts/footer.xslt"/>
           <xsl:template match="/"><html><body><xsl:apply-templates select="." mode="content"/><xsl:call-template name="footer"/></body></html></xsl:template>"#,
    )?;
    write(
        dir.path(),
        "blog/parts/footer.xslt",
        r#"<xsl:template name="footer"><footer><xsl:value-of select="xdjango:site.name.upper()"/></footer></xsl:template>"#,
    )?;
    write(
        dir.path(),
        "blog/index.xslt",
        r#"<xsl:import href="base.xslt"/>
           <xsl:template match="/" mode="content"><h1><xsl:value-of select="xdjango:heading()"/></h1></xsl:template>"#,
    )?;

    let renderer = PageRenderer::new(Settings {
        default_namespace: "blog/".to_string(),
        ..settings(dir.path())
    });
    let out = renderer.page(
        "index",
        None,
        context(json!({"site": {"name": "example"}})),
        [("heading", "Latest posts")],
    )?;
    let ns = [("h", XHTML)];
    assert_xpath(&out, "/h:html/h:body/h:h1[. = 'Latest posts']", &ns);
    assert_xpath(&out, "/h:html/h:body/h:footer[. = 'EXAMPLE']", &ns);

    let transformer = renderer.transformer("blog/index.xslt")?;
    assert_eq!(transformer.registry().names(), vec!["heading", "site"]);
    Ok(())
}

#[test]
fn test_pages_are_compiled_once() -> TestResult {
    init_logging();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "about.xslt", &root_template(r#"<p><xsl:value-of select="xdjango:who()"/></p>"#))?;
    let renderer = PageRenderer::new(settings(dir.path()));

    for who in ["ann", "bob"] {
        let out = renderer.page("about", None, TemplateContext::new(), [("who", who)])?;
        assert_xpath(&out, &format!("/h:p[. = '{}']", who), &[("h", XHTML)]);
    }
    assert_eq!(renderer.cached(), 1);
    let first = renderer.transformer("about.xslt")?;
    let second = renderer.transformer("about.xslt")?;
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}

#[test]
fn test_page_pattern_and_namespace() -> TestResult {
    init_logging();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "site/pages/contact.xsl", &root_template("<p>contact</p>"))?;
    let renderer = PageRenderer::new(Settings {
        page_pattern: "{namespace}pages/{page}.xsl".to_string(),
        ..settings(dir.path())
    });
    let out = renderer.page("contact", Some("site/"), TemplateContext::new(), Vec::<(String, ContextValue)>::new())?;
    assert_xpath(&out, "/h:p[. = 'contact']", &[("h", XHTML)]);
    Ok(())
}

#[test]
fn test_missing_page_reports_the_path() -> TestResult {
    init_logging();
    let dir = tempfile::tempdir()?;
    let renderer = PageRenderer::new(settings(dir.path()));
    let err = renderer
        .page("nowhere", None, TemplateContext::new(), Vec::<(String, ContextValue)>::new())
        .unwrap_err();
    match err {
        XdjangoError::Transform(TransformError::Stylesheet { path, .. }) => assert_eq!(path, "nowhere.xslt"),
        other => panic!("unexpected error: {}", other),
    }
    Ok(())
}

#[test]
fn test_missing_import_is_fatal() -> TestResult {
    init_logging();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "broken.xslt", r#"<xsl:import href="gone.xslt"/>"#)?;
    let err = render_to_string(&settings(dir.path()), "broken.xslt", TemplateContext::new()).unwrap_err();
    assert!(err.to_string().contains("broken.xslt"), "{}", err);
    Ok(())
}

#[test]
fn test_debug_settings_render_error_page() -> TestResult {
    init_logging();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "rows.xslt", &root_template(r#"<xdjango:queryset key="rows"/>"#))?;
    let renderer = PageRenderer::new(Settings {
        debug: true,
        ..settings(dir.path())
    });
    let out = renderer.render_to_string("rows.xslt", TemplateContext::new())?;
    assert!(out.starts_with("<html><h1>an error occurred</h1>"), "{}", out);
    Ok(())
}

#[test]
fn test_configured_renderer_paths() -> TestResult {
    init_logging();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "price.xslt", &root_template(r#"<p><xsl:value-of select="xdjango:price('money')"/></p>"#))?;
    let catalog = Arc::new(RendererCatalog::new());
    catalog.register("shop.renderers.money", |value: &ContextValue, _args: &[String]| {
        Ok(format!("${}", value).into())
    });
    let mut settings = settings(dir.path());
    settings.renderers.insert("money".to_string(), "shop.renderers.money".to_string());

    let renderer = PageRenderer::new(settings).with_catalog(catalog);
    let out = renderer.render_to_string("price.xslt", context(json!({"price": 12})))?;
    assert_xpath(&out, "/h:p[. = '$12']", &[("h", XHTML)]);
    Ok(())
}
