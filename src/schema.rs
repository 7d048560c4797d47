//! Row schema: the fixed field layout shared by export and import.
//!
//! Every leaf tag kind declares its sub-fields in document order. The same
//! order drives sub-field insertion, so a node's children always follow the
//! schema sequence no matter which fields a row happens to populate.

use std::fmt;

/// Column holding the FullPath primary key.
pub const FULL_PATH_COLUMN: &str = "FullPath";
/// Column holding the leaf tag kind.
pub const TAG_TYPE_COLUMN: &str = "TagType";
/// Sentinel written into a carrier column when the value is a formula.
pub const EXPRESSION_MARKER: &str = "ParamExpression";
/// Element holding the limit block of a FormulaValue.
pub const LIMIT_ELEMENT: &str = "FormulaValueLimit";
/// Prefix of limit block columns.
pub const LIMIT_COLUMN_PREFIX: &str = "FormulaValueLimit_";
/// Child of a Step naming the document it expands into.
pub const STEP_RECIPE_ID: &str = "StepRecipeID";

/// Enumerated tag kinds of addressable nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// Document root (`RecipeElement`).
    Document,
    /// `Steps` container.
    StepList,
    Step,
    Parameter,
    FormulaValue,
}

impl TagKind {
    pub const LEAVES: [TagKind; 2] = [TagKind::Parameter, TagKind::FormulaValue];

    pub fn element_name(self) -> &'static str {
        match self {
            TagKind::Document => "RecipeElement",
            TagKind::StepList => "Steps",
            TagKind::Step => "Step",
            TagKind::Parameter => "Parameter",
            TagKind::FormulaValue => "FormulaValue",
        }
    }

    /// Leaf kind named by a `TagType` cell or a FullPath segment.
    pub fn leaf_from_name(name: &str) -> Option<TagKind> {
        match name.trim() {
            "Parameter" => Some(TagKind::Parameter),
            "FormulaValue" => Some(TagKind::FormulaValue),
            _ => None,
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, TagKind::Parameter | TagKind::FormulaValue)
    }

    /// Container kind a leaf of this kind must be inserted into.
    pub fn parent_kind(self) -> Option<TagKind> {
        match self {
            TagKind::Parameter => Some(TagKind::Document),
            TagKind::FormulaValue => Some(TagKind::Step),
            TagKind::Step => Some(TagKind::StepList),
            TagKind::StepList => None,
            TagKind::Document => None,
        }
    }

    /// Sibling tags that come after this leaf kind inside its container.
    pub fn followers(self) -> &'static [&'static str] {
        match self {
            TagKind::Parameter | TagKind::FormulaValue => {
                &["Steps", "Transitions", "ElementLinks"]
            }
            _ => &[],
        }
    }

    /// Declared sub-fields, in document order.
    pub fn fields(self) -> &'static [Field] {
        match self {
            TagKind::Parameter => PARAMETER_FIELDS,
            TagKind::FormulaValue => FORMULA_VALUE_FIELDS,
            _ => &[],
        }
    }

    pub fn declares(self, field: Field) -> bool {
        if field.is_limit() {
            return self == TagKind::FormulaValue;
        }
        self.fields().contains(&field)
    }

    pub fn has_limit_block(self) -> bool {
        self == TagKind::FormulaValue
    }

    /// Element order used when inserting sub-elements into a leaf.
    pub fn element_order(self) -> Vec<&'static str> {
        let mut order: Vec<&'static str> = self.fields().iter().map(|f| f.tag()).collect();
        if self.has_limit_block() {
            order.push(LIMIT_ELEMENT);
        }
        order
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// Lexical type of a sub-field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Decimal,
    Integer,
    Boolean,
    Enumeration,
}

impl ValueType {
    /// Whether `text` is a valid lexical form for this type.
    pub fn accepts(self, text: &str) -> bool {
        let text = text.trim();
        match self {
            ValueType::String | ValueType::Enumeration => true,
            ValueType::Decimal => text.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false),
            ValueType::Integer => text.parse::<i64>().is_ok(),
            ValueType::Boolean => {
                text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false")
            }
        }
    }
}

/// Where a field lives relative to its leaf element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    /// Direct child element of the leaf.
    Element,
    /// Attribute of the limit block element.
    LimitAttribute,
    /// Child element of the limit block.
    LimitMember,
}

/// Every sub-field column known to the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Name,
    ErpAlias,
    PlcReference,
    Display,
    Value,
    Defer,
    ParamExpression,
    Real,
    Integer,
    String,
    EnumerationSet,
    EnumerationMember,
    High,
    Low,
    EngineeringUnits,
    Scale,
    LimitVerification,
    LimitLowLowLow,
    LimitLowLow,
    LimitLow,
    LimitHigh,
    LimitHighHigh,
    LimitHighHighHigh,
}

pub const FIELD_COUNT: usize = 23;

const PARAMETER_FIELDS: &[Field] = &[
    Field::Name,
    Field::ErpAlias,
    Field::PlcReference,
    Field::Real,
    Field::Integer,
    Field::String,
    Field::EnumerationSet,
    Field::EnumerationMember,
    Field::High,
    Field::Low,
    Field::EngineeringUnits,
    Field::Scale,
];

const FORMULA_VALUE_FIELDS: &[Field] = &[
    Field::Name,
    Field::Display,
    Field::Value,
    Field::Defer,
    Field::ParamExpression,
    Field::Real,
    Field::Integer,
    Field::String,
    Field::EnumerationSet,
    Field::EnumerationMember,
    Field::EngineeringUnits,
];

/// Limit block fields; the attribute first, then members in element order.
pub const LIMIT_FIELDS: &[Field] = &[
    Field::LimitVerification,
    Field::LimitLowLowLow,
    Field::LimitLowLow,
    Field::LimitLow,
    Field::LimitHigh,
    Field::LimitHighHigh,
    Field::LimitHighHighHigh,
];

impl Field {
    /// All fields in canonical column order.
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Name,
        Field::ErpAlias,
        Field::PlcReference,
        Field::Display,
        Field::Value,
        Field::Defer,
        Field::ParamExpression,
        Field::Real,
        Field::Integer,
        Field::String,
        Field::EnumerationSet,
        Field::EnumerationMember,
        Field::High,
        Field::Low,
        Field::EngineeringUnits,
        Field::Scale,
        Field::LimitVerification,
        Field::LimitLowLowLow,
        Field::LimitLowLow,
        Field::LimitLow,
        Field::LimitHigh,
        Field::LimitHighHigh,
        Field::LimitHighHighHigh,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Element (or attribute) name in the document.
    pub fn tag(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::ErpAlias => "ERPAlias",
            Field::PlcReference => "PLCReference",
            Field::Display => "Display",
            Field::Value => "Value",
            Field::Defer => "Defer",
            Field::ParamExpression => "ParamExpression",
            Field::Real => "Real",
            Field::Integer => "Integer",
            Field::String => "String",
            Field::EnumerationSet => "EnumerationSet",
            Field::EnumerationMember => "EnumerationMember",
            Field::High => "High",
            Field::Low => "Low",
            Field::EngineeringUnits => "EngineeringUnits",
            Field::Scale => "Scale",
            Field::LimitVerification => "Verification",
            Field::LimitLowLowLow => "LowLowLowValue",
            Field::LimitLowLow => "LowLowValue",
            Field::LimitLow => "LowValue",
            Field::LimitHigh => "HighValue",
            Field::LimitHighHigh => "HighHighValue",
            Field::LimitHighHighHigh => "HighHighHighValue",
        }
    }

    /// Spreadsheet column header.
    pub fn column(self) -> String {
        if self.is_limit() {
            format!("{}{}", LIMIT_COLUMN_PREFIX, self.tag())
        } else {
            self.tag().to_string()
        }
    }

    pub fn from_column(column: &str) -> Option<Field> {
        let column = column.trim();
        Field::ALL.iter().copied().find(|f| f.column() == column)
    }

    pub fn location(self) -> FieldLocation {
        match self {
            Field::LimitVerification => FieldLocation::LimitAttribute,
            f if f.is_limit() => FieldLocation::LimitMember,
            _ => FieldLocation::Element,
        }
    }

    pub fn is_limit(self) -> bool {
        LIMIT_FIELDS.contains(&self)
    }

    pub fn value_type(self) -> ValueType {
        match self {
            Field::Real | Field::High | Field::Low => ValueType::Decimal,
            Field::LimitLowLowLow
            | Field::LimitLowLow
            | Field::LimitLow
            | Field::LimitHigh
            | Field::LimitHighHigh
            | Field::LimitHighHighHigh => ValueType::Decimal,
            Field::Integer | Field::PlcReference => ValueType::Integer,
            Field::Display | Field::Scale => ValueType::Boolean,
            Field::EnumerationMember => ValueType::Enumeration,
            _ => ValueType::String,
        }
    }

    /// Carrier group this field belongs to, if any.
    pub fn carrier(self) -> Option<ValueCarrier> {
        match self {
            Field::Real => Some(ValueCarrier::Real),
            Field::Integer => Some(ValueCarrier::Integer),
            Field::String => Some(ValueCarrier::String),
            Field::EnumerationSet | Field::EnumerationMember => Some(ValueCarrier::Enumeration),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column())
    }
}

/// Mutually exclusive groups holding "the" value of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueCarrier {
    Real,
    Integer,
    String,
    Enumeration,
}

impl ValueCarrier {
    pub const ALL: [ValueCarrier; 4] = [
        ValueCarrier::Real,
        ValueCarrier::Integer,
        ValueCarrier::String,
        ValueCarrier::Enumeration,
    ];

    pub fn fields(self) -> &'static [Field] {
        match self {
            ValueCarrier::Real => &[Field::Real],
            ValueCarrier::Integer => &[Field::Integer],
            ValueCarrier::String => &[Field::String],
            ValueCarrier::Enumeration => &[Field::EnumerationSet, Field::EnumerationMember],
        }
    }

    /// Field that holds the formula text when the expression marker is used.
    pub fn expression_field(self) -> Option<Field> {
        match self {
            ValueCarrier::Real => Some(Field::Real),
            ValueCarrier::Integer => Some(Field::Integer),
            ValueCarrier::String => Some(Field::String),
            ValueCarrier::Enumeration => None,
        }
    }
}

impl fmt::Display for ValueCarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueCarrier::Real => "Real",
            ValueCarrier::Integer => "Integer",
            ValueCarrier::String => "String",
            ValueCarrier::Enumeration => "Enumeration",
        };
        f.write_str(name)
    }
}

/// Sheet columns for the leaf kinds present in a document.
///
/// Reserved columns come first, then the union of declared fields in
/// canonical order. With no kinds present every field is listed so new rows
/// can still be typed in.
pub fn columns_for(kinds: &[TagKind]) -> Vec<String> {
    let kinds: Vec<TagKind> = if kinds.is_empty() {
        TagKind::LEAVES.to_vec()
    } else {
        kinds.to_vec()
    };
    let mut columns = vec![FULL_PATH_COLUMN.to_string(), TAG_TYPE_COLUMN.to_string()];
    for field in Field::ALL {
        if kinds.iter().any(|kind| kind.declares(field)) {
            columns.push(field.column());
        }
    }
    columns
}
