//! Documents and stylesheets shared by the integration tests.

pub const NESTED: &str = "<root><a><x attr='test'>1</x></a><a><x>2</x></a></root>";

pub const THREE_AS: &str = "<x><a/><a/><a/></x>";

pub const XHTML: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><div>text</div></html>"#;

pub const BO_MODEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Root xmlns="http://standards.iso.org/iso/ts/10303/-3001/-ed-2/tech/xml-schema/bo_model">
  <A>
    <B>Content</B>
  </A>
</Root>"#;

pub const BO_MODEL_NS: &str =
    "http://standards.iso.org/iso/ts/10303/-3001/-ed-2/tech/xml-schema/bo_model";

pub const CREATES_DONE_XSL: &str = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="2.0">
  <xsl:template match="/"><done/></xsl:template>
</xsl:stylesheet>"#;

pub const CREATES_HELLO_XSL: &str = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
  <xsl:output method="text"/>
  <xsl:template match="/">hello</xsl:template>
</xsl:stylesheet>"#;

pub const VALUE_OF_BOOM_XSL: &str = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
  <xsl:output method="text"/>
  <xsl:param name="boom"/>
  <xsl:template match="/">[<xsl:value-of select="$boom"/>]</xsl:template>
</xsl:stylesheet>"#;

pub const VALUE_OF_FAA_XSL: &str = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
  <xsl:output method="text"/>
  <xsl:param name="faa" select="0"/>
  <xsl:template match="/">
    <xsl:value-of select="concat('+', $faa, '+')"/>
  </xsl:template>
</xsl:stylesheet>"#;

pub const FIRST_XSL: &str = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
  <xsl:import href="second.xsl"/>
  <xsl:template match="/">
    <xsl:call-template name="rounded">
      <xsl:with-param name="value" select="5.67"/>
    </xsl:call-template>
  </xsl:template>
</xsl:stylesheet>"#;

pub const SECOND_XSL: &str = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
  <xsl:template name="rounded">
    <xsl:param name="value"/>
    <result><xsl:value-of select="round($value)"/></result>
  </xsl:template>
</xsl:stylesheet>"#;

pub const FIRST_WITH_PARAM_XSL: &str = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
  <xsl:import href="second.xsl"/>
  <xsl:param name="faa"/>
  <xsl:template match="/">
    <result><number><xsl:value-of select="$faa"/></number></result>
  </xsl:template>
</xsl:stylesheet>"#;
