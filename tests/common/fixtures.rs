/// A stylesheet with the xdjango namespace bound and `body` as its top-level content.
pub fn stylesheet(body: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<xsl:stylesheet version="1.0"
    xmlns="http://www.w3.org/1999/xhtml"
    xmlns:xsl="http://www.w3.org/1999/XSL/Transform"
    xmlns:xdjango="http://djangoproject.com/template/xslt"
    extension-element-prefixes="xdjango"
    exclude-result-prefixes="xdjango">
  <xsl:output omit-xml-declaration="yes"/>
  {}
</xsl:stylesheet>"#,
        body
    )
}

/// A template matching the root that runs `content`.
pub fn root_template(content: &str) -> String {
    format!(r#"<xsl:template match="/">{}</xsl:template>"#, content)
}

/// The page a blog post is rendered with: a title, a body through a renderer, and the
/// post's tags listed by `xdjango:queryset`.
pub const POST_PAGE: &str = r#"
  <xsl:template match="/">
    <html>
      <head><title><xsl:value-of select="xdjango:post.title()"/></title></head>
      <body>
        <h1 class="{xdjango:post.kind()}"><xsl:value-of select="xdjango:post.title.upper()"/></h1>
        <xsl:copy-of select="xdjango:post.body('parsehtml')"/>
        <ul><xdjango:queryset key="post.tags" dest="tag"/></ul>
      </body>
    </html>
  </xsl:template>
  <xsl:template match="xdjango:tag">
    <li><a href="/tags/{xdjango:tag.slug()}"><xsl:value-of select="xdjango:tag.name()"/></a></li>
  </xsl:template>
"#;
