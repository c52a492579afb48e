//! サーバー → ターミナル方向のタグ表
//!
//! 各タグは 1 バイトの序数としてワイヤに載り、宣言されたプリミティブ型で
//! ペイロードの形が決まる。序数はプロデューサとコンシューマの契約なので
//! **追記のみ**：既存の序数の意味は変えず、使わなくなったタグも残す。

use crate::error::ModelError;
use crate::value_type::ValueType;

macro_rules! server_to_client_model {
    (@obsolete obsolete) => { true };
    (@obsolete) => { false };
    ($($name:ident = $ord:literal => $ty:ident $([$flag:ident])?,)*) => {
        /// ワイヤタグ（明示的な序数 → プリミティブ型の対応表）
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum ServerToClientModel {
            $($name = $ord,)*
        }

        impl ServerToClientModel {
            /// 宣言順（= 序数順）の全タグ
            pub const ALL: &'static [ServerToClientModel] = &[
                $(ServerToClientModel::$name,)*
            ];

            /// タグの宣言型
            pub const fn value_type(self) -> ValueType {
                match self {
                    $(ServerToClientModel::$name => ValueType::$ty,)*
                }
            }

            /// タグ名（ログ用）
            pub const fn name(self) -> &'static str {
                match self {
                    $(ServerToClientModel::$name => stringify!($name),)*
                }
            }

            /// 廃止済みタグか
            pub const fn is_obsolete(self) -> bool {
                match self {
                    $(ServerToClientModel::$name => server_to_client_model!(@obsolete $($flag)?),)*
                }
            }
        }
    };
}

server_to_client_model! {
    StringDictionary = 0 => Json,
    Heartbeat = 1 => Null,
    PingServer = 2 => Long,
    CreateContext = 3 => Integer,
    DestroyContext = 4 => Null,
    End = 5 => Null,
    OptionFormfieldTabulation = 6 => Boolean,
    TypeCreate = 7 => Integer,
    TypeUpdate = 8 => Integer,
    TypeAdd = 9 => Integer,
    TypeRemove = 10 => Integer,
    TypeAddHandler = 11 => Integer,
    TypeRemoveHandler = 12 => Null,
    TypeHistory = 13 => StringAscii,
    TypeGc = 14 => Integer,
    Native = 15 => Json,
    Date = 16 => Long,
    Value = 17 => StringUtf8,
    ParentObjectId = 18 => Integer,
    PutStyleKey = 19 => StringAscii,
    StyleValue = 20 => StringAscii,
    RemoveStyleKey = 21 => StringAscii,
    PutPropertyKey = 22 => StringAscii,
    PropertyValue = 23 => StringUtf8,
    PutAttributeKey = 24 => StringAscii,
    AttributeValue = 25 => StringUtf8,
    RemoveAttributeKey = 26 => StringAscii,
    AddStyleName = 27 => StringAscii,
    RemoveStyleName = 28 => StringAscii,
    Href = 29 => StringUtf8,
    Text = 30 => StringUtf8,
    Html = 31 => StringUtf8,
    WidgetId = 32 => Integer,
    Widget = 33 => Null,
    ValueCheckbox = 34 => Byte,
    WordWrap = 35 => Boolean,
    Clear = 36 => Null,
    ClearRow = 37 => Integer,
    InsertRow = 38 => Integer,
    CellPadding = 39 => Integer,
    CellSpacing = 40 => Integer,
    HorizontalAlignment = 41 => Byte,
    WidgetHorizontalAlignment = 42 => Byte,
    Vertical = 43 => Boolean,
    VerticalAlignment = 44 => Byte,
    WidgetVerticalAlignment = 45 => Byte,
    WidgetHidden = 46 => Boolean,
    Left = 47 => Double,
    Right = 48 => Double,
    Width = 49 => Double,
    Top = 50 => Double,
    Bottom = 51 => Double,
    Height = 52 => Double,
    Unit = 53 => Byte,
    Animate = 54 => Integer,
    AnimationDuration = 55 => Integer,
    Open = 56 => Null,
    Close = 57 => Null,
    Bind = 58 => StringAscii,
    CellHeight = 59 => StringAscii,
    CellWidth = 60 => StringAscii,
    Index = 61 => Integer,
    AddCookie = 62 => StringAscii,
    RemoveCookie = 63 => StringAscii,
    CookieExpire = 64 => Long,
    CookieDomain = 65 => StringAscii,
    CookiePath = 66 => StringUtf8,
    CookieSecure = 67 => Null,
    Time = 68 => Long,
    Animation = 69 => Boolean,
    CursorPosition = 70 => Integer,
    SelectionRangeStart = 71 => Integer,
    SelectionRangeLength = 72 => Integer,
    MaxLength = 73 => Integer,
    VisibleLength = 74 => Integer,
    RegexFilter = 75 => StringUtf8,
    Mask = 76 => StringUtf8,
    Visibility = 77 => Boolean,
    ReplacementString = 78 => StringUtf8,
    DateFormatPattern = 79 => StringUtf8,
    KeepDayTimeNeeded = 80 => Null,
    Tag = 81 => StringAscii,
    Picker = 82 => Integer,
    Row = 83 => Integer,
    RowFormatterAddStyleName = 84 => StringAscii,
    RowFormatterRemoveStyleName = 85 => StringAscii,
    RowFormatterSetStyleName = 86 => StringAscii,
    Column = 87 => Integer,
    CellFormatterAddStyleName = 88 => StringAscii,
    CellFormatterRemoveStyleName = 89 => StringAscii,
    CellFormatterSetStyleName = 90 => StringAscii,
    ColumnFormatterColumnWidth = 91 => StringAscii,
    ColumnFormatterAddStyleName = 92 => StringAscii,
    ColumnFormatterRemoveStyleName = 93 => StringAscii,
    ColumnFormatterSetStyleName = 94 => StringAscii,
    Placeholder = 95 => StringUtf8,
    DateEnabled = 96 => StringUtf8,
    Enabled = 97 => Boolean,
    AddDateStyle = 98 => StringUtf8,
    StyleName = 99 => StringAscii,
    RemoveDateStyle = 100 => StringUtf8,
    YearArrowsVisible = 101 => Boolean,
    PopupCaption = 102 => StringUtf8,
    WidgetVisible = 103 => Boolean,
    ImageWidth = 104 => Integer,
    ImageHeight = 105 => Integer,
    WidgetWidth = 106 => StringAscii,
    WidgetHeight = 107 => StringAscii,
    WidgetTitle = 108 => StringUtf8,
    StylePrimaryName = 109 => StringAscii,
    EnsureDebugId = 110 => StringAscii,
    ItemInserted = 111 => StringUtf8,
    ItemUpdated = 112 => StringUtf8,
    ItemRemoved = 113 => Integer,
    Selected = 114 => Boolean,
    SelectedIndex = 115 => Integer,
    Multiselect = 116 => Boolean,
    VisibleItemCount = 117 => Integer,
    ItemAdd = 118 => StringUtf8,
    ItemGroup = 119 => StringUtf8,
    PopupAutoHide = 120 => Boolean,
    Modal = 121 => Boolean,
    PopupGlassEnabled = 122 => Boolean,
    Draggable = 123 => Boolean,
    Center = 124 => Null,
    PositionLeft = 125 => Integer,
    PositionTop = 126 => Integer,
    Fixdelay = 127 => Long,
    MinSize = 128 => Integer,
    SnapClosedSize = 129 => Integer,
    ToggleDisplayAllowed = 130 => Boolean,
    ImageUrl = 131 => StringUtf8,
    InsertHorizontalRule = 132 => Null,
    InsertHtml = 133 => StringUtf8,
    Ordered = 134 => Null,
    Unordered = 135 => Null,
    BackColor = 136 => StringAscii,
    FontName = 137 => StringAscii,
    FontSize = 138 => Byte,
    FontColor = 139 => StringAscii,
    Justification = 140 => Byte,
    ToggleBold = 141 => Null,
    ToggleItalic = 142 => Null,
    ToggleSubscript = 143 => Null,
    ToggleUnderline = 144 => Null,
    LeftIndent = 145 => Null,
    Redo = 146 => Null,
    RemoveFormat = 147 => Null,
    RemoveLink = 148 => Null,
    ToggleRightIndent = 149 => Null,
    SelectAll = 150 => Null,
    CommandId = 151 => Long,
    Oracle = 152 => Integer,
    StreamRequestId = 153 => Integer,
    TreeRoot = 154 => Integer,
    Factory = 155 => StringAscii,
    Direction = 156 => Byte,
    Size = 157 => Double,
    WidgetSize = 158 => Double,
    Resize = 159 => Null,
    BeforeIndex = 160 => Integer,
    TabWidget = 161 => Integer,
    TabText = 162 => StringUtf8,
    EnabledOnRequest = 163 => Boolean,
    Tabindex = 164 => Integer,
    EndOfProcessing = 165 => Null,
    Focus = 166 => Boolean,
    HandlerType = 167 => Byte,
    DomHandlerCode = 168 => Byte,
    HistoryFireEvents = 169 => Boolean,
    LoadingOnRequest = 170 => Boolean,
    SetColSpan = 171 => Integer,
    SetRowSpan = 172 => Integer,
    KeyFilter = 173 => Json,
    PopupPositionAndShow = 174 => Null,
    RootId = 175 => StringAscii,
    WindowId = 176 => Integer,
    FrameId = 177 => Integer,
    Eval = 178 => StringUtf8,
    VisibleLines = 179 => Integer,
    CharacterWidth = 180 => Integer,
    HorizontalScrollPosition = 181 => Integer,
    VerticalScrollPosition = 182 => Integer,
    ScrollTo = 183 => Integer,
    Limit = 184 => Integer,
    Suggestion = 185 => StringUtf8,
    Features = 186 => StringUtf8,
    Relative = 187 => Boolean,
    Url = 188 => StringUtf8,
    WidgetType = 189 => Byte,
    PreventEvent = 190 => Integer,
    StopEvent = 191 => Integer,
    BorderWidth = 192 => Integer,
    Spacing = 193 => Integer,
    Name = 194 => StringUtf8,
    WidgetFullSize = 195 => Null,
    WindowTitle = 196 => StringUtf8,
    WindowLocationReplace = 197 => StringUtf8,
    ResizeByX = 198 => Double,
    ResizeByY = 199 => Double,
    ResizeToWidth = 200 => Integer,
    ResizeToHeight = 201 => Integer,
    MoveByX = 202 => Double,
    MoveByY = 203 => Double,
    MoveToX = 204 => Double,
    MoveToY = 205 => Double,
    Print = 206 => Null,
    PaddonCreation = 207 => Json,
    PaddonMethod = 208 => StringAscii,
    PaddonArguments = 209 => Json,
    Destroy = 210 => Null,
    // 廃止済み（序数を固定するため残置。新規送信には使わない）
    PopupGlassStyleName = 211 => Integer [obsolete],
    DisclosurePanelOpenImg = 212 => Integer [obsolete],
    DisclosurePanelCloseImg = 213 => Integer [obsolete],
    Suggestions = 214 => StringUtf8 [obsolete],
    DefaultSuggestions = 215 => StringUtf8 [obsolete],
    TextboxId = 216 => Integer [obsolete],
}

impl ServerToClientModel {
    /// 登録済みタグ数
    pub const COUNT: usize = Self::ALL.len();

    /// 序数
    pub fn ordinal(self) -> u16 {
        self as u16
    }

    /// ワイヤに書くタグバイト
    ///
    /// 序数が 1 バイトに収まることはコンパイル時に確認済み
    /// （`ordinals_are_wire_compatible`）。
    pub fn tag_byte(self) -> u8 {
        self as u16 as u8
    }

    /// 序数が宣言順に 0 から連続し、どれも 1 バイトに収まるか
    pub const fn ordinals_are_wire_compatible() -> bool {
        let mut position = 0;
        while position < Self::ALL.len() {
            let ordinal = Self::ALL[position] as u16;
            if ordinal as usize != position || ordinal > u8::MAX as u16 {
                return false;
            }
            position += 1;
        }
        true
    }

    /// 序数からタグを引く
    ///
    /// # エラー
    /// - `ModelError::OutOfRange`: 登録数以上の序数
    pub fn from_raw(ordinal: u16) -> Result<Self, ModelError> {
        Self::ALL
            .get(ordinal as usize)
            .copied()
            .ok_or(ModelError::OutOfRange {
                ordinal,
                count: Self::COUNT,
            })
    }
}

// タグ表を壊す変更はビルドを通さない
const _: () = assert!(
    ServerToClientModel::ordinals_are_wire_compatible(),
    "tag ordinals must be contiguous from 0 and fit in one byte"
);

impl core::fmt::Display for ServerToClientModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
